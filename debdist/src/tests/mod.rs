mod build;
mod mock;
mod publish;
