//! Status codes returned by RPC operations as their `return_value`.

/// Win32 error codes (MS-ERREF 2.2).
pub mod win32 {
    pub const ERROR_SUCCESS: u32 = 0;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_NOT_SUPPORTED: u32 = 50;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INVALID_LEVEL: u32 = 124;
    pub const ERROR_MORE_DATA: u32 = 234;
    pub const ERROR_SHUTDOWN_IN_PROGRESS: u32 = 1115;
    pub const ERROR_NO_SHUTDOWN_IN_PROGRESS: u32 = 1116;
    pub const ERROR_INVALID_HANDLE: u32 = 6;
}

/// HRESULT values (MS-ERREF 2.1), as the signed 32-bit NDR `long` they travel as.
pub mod hresult {
    pub const S_OK: i32 = 0;
    pub const E_NOTIMPL: i32 = 0x80004001_u32 as i32;
    pub const E_NOINTERFACE: i32 = 0x80004002_u32 as i32;
    pub const E_INVALIDARG: i32 = 0x80070057_u32 as i32;
}
