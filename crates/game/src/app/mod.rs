mod assets;
pub(crate) mod bootstrap;
mod headless;
pub(crate) mod loop_runner;
mod map_files;
mod scenario;
