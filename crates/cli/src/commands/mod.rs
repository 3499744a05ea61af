pub mod add;
pub mod info;
pub mod migrate;
pub mod rollback;
pub mod status;
