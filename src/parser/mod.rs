// Small nom parsers for loosely formatted cells and command-line arguments

pub mod dimensions;
pub mod lexer;
pub mod year;

// Public API re-exports
pub use dimensions::parse_dimension_list;
pub use year::parse_year;
