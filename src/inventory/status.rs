use crate::inventory::StockStatus;

/// Maps a stock level and reorder threshold to a status tag.
///
/// `Critical` when nothing is left, `Low` at or below the threshold, `Ok`
/// otherwise. A zero threshold means only an empty shelf is flagged.
pub fn derive_stock_status(stock_level: u32, reorder_threshold: u32) -> StockStatus {
    if stock_level == 0 {
        StockStatus::Critical
    } else if stock_level <= reorder_threshold {
        StockStatus::Low
    } else {
        StockStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::derive_stock_status;
    use crate::inventory::StockStatus;

    #[test]
    fn classifies_boundaries() {
        assert_eq!(derive_stock_status(0, 0), StockStatus::Critical);
        assert_eq!(derive_stock_status(0, 15), StockStatus::Critical);
        assert_eq!(derive_stock_status(1, 15), StockStatus::Low);
        assert_eq!(derive_stock_status(15, 15), StockStatus::Low);
        assert_eq!(derive_stock_status(16, 15), StockStatus::Ok);
        assert_eq!(derive_stock_status(1, 0), StockStatus::Ok);
    }

    #[test]
    fn status_is_exactly_one_tag_over_a_grid() {
        for threshold in 0..30u32 {
            for stock in 0..60u32 {
                let status = derive_stock_status(stock, threshold);
                let expected = if stock == 0 {
                    StockStatus::Critical
                } else if stock <= threshold {
                    StockStatus::Low
                } else {
                    StockStatus::Ok
                };
                assert_eq!(status, expected, "stock={stock} threshold={threshold}");
                assert_eq!(status, derive_stock_status(stock, threshold));
            }
        }
    }
}
