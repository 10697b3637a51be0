mod condition;
mod determinism;
mod generator;
mod join;
mod routing;
mod terminate;
mod timer;
