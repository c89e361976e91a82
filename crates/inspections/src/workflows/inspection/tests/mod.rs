mod common;
mod photos;
