mod common;
mod entities;
mod evaluation;
