use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Single-line JSON, one record per line in watch mode.
pub fn render_json_line<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::{render_json, render_json_line};
    use crate::inventory::Product;

    #[test]
    fn line_output_has_no_newlines() {
        let product = Product::new("CHIP-X", "X-Series Microchip", 15, 20);
        let line = render_json_line(&product).unwrap();
        assert!(!line.contains('\n'));
        assert!(render_json(&product).unwrap().contains("\n"));
        assert!(line.contains("\"status\":\"Low\""));
    }
}
