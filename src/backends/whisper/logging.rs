use std::os::raw::{c_char, c_void};
use std::sync::Once;

/// No-op callback that swallows whisper.cpp's native log output.
unsafe extern "C" fn whisper_log_callback(
    _level: u32,
    _c_msg: *const c_char,
    _user_data: *mut c_void,
) {
}

/// Silence whisper.cpp logging. Runs once per process; later calls are no-ops.
pub fn init_whisper_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    });
}
