mod environment;
mod governor;
mod polling;
mod support;
