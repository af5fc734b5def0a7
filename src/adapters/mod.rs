pub mod convention;
