pub mod cli_summary;
