mod test_archive;
mod test_fsm;
mod test_http;
mod test_manifest;
mod test_polling;
mod test_upload;
