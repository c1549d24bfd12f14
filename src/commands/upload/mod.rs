mod credentials;
mod records;
mod run;
mod store;

pub use run::run;
