pub mod table;
pub mod value;

pub use table::ResultTable;
pub use value::Value;
