pub mod api {
    pub const DEFAULT_BASE_URL: &str = "https://api.bexio.com/2.0";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
    pub const USER_AGENT: &str = "bexio-mcp/1.2";
    /// Batch size fetched when a search endpoint rejects both criteria
    /// shapes and we fall back to client-side filtering.
    pub const SEARCH_FALLBACK_LIMIT: u64 = 200;
}

pub mod env {
    pub const ACCESS_TOKEN: &str = "BEXIO_ACCESS_TOKEN";
    pub const API_URL: &str = "BEXIO_API_URL";
    pub const TIMEOUT: &str = "BEXIO_TIMEOUT";
}

pub mod positions {
    pub const DEFAULT_TYPE: &str = "KbPositionCustom";
    pub const DEFAULT_TEXT: &str = "Service";
    pub const DEFAULT_AMOUNT: i64 = 1;
    pub const DEFAULT_UNIT_PRICE: f64 = 0.0;
    /// Last-resort tax id when the taxes collection cannot be queried.
    pub const FALLBACK_TAX_ID: i64 = 1;
}
