pub mod event;
pub mod file_download;
pub mod lm_list;
pub mod nl_send;
