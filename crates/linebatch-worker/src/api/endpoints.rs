//! Coordinator endpoint URL builders

pub fn random_batch_url(base_url: &str) -> String {
    format!("{}/get_random_batch", base_url)
}

pub fn complete_batch_url(base_url: &str) -> String {
    format!("{}/complete_batch", base_url)
}

pub fn progress_url(base_url: &str) -> String {
    format!("{}/get_progress", base_url)
}

pub fn update_progress_url(base_url: &str) -> String {
    format!("{}/update_progress", base_url)
}

/// Build sequential batch URL
pub fn batch_url(base_url: &str, batch_index: u64) -> String {
    format!("{}/get_batch?batch={}", base_url, batch_index)
}

pub fn skip_batch_url(base_url: &str) -> String {
    format!("{}/skip_batch", base_url)
}

pub fn status_url(base_url: &str) -> String {
    format!("{}/status", base_url)
}
