pub mod integrity;
pub mod records;
pub mod rewards;
