//! Compile-time defaults, generated by build.rs (see `WEFT_CONFIG_RS`)

include!(concat!(env!("OUT_DIR"), "/weft_merged_config.rs"));
