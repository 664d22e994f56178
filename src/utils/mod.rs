pub mod amount;

pub use amount::{
    format_minor_units, parse_chain_id, parse_display_amount, to_hex_chain_id, ChainIdField,
};
