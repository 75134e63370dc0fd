pub mod catalog_reader;
pub mod line_item_reader;
