//! Cart quantity rules and merge-on-login.

use std::collections::HashMap;

use crate::ProductId;

/// Upper bound on a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("you can add at most {max} of one product")]
    LineLimit { max: i32 },
    #[error("only {available} left in stock")]
    InsufficientStock { available: i32 },
    #[error("this product is not available")]
    Unavailable,
}

/// Check a requested line quantity against the per-line cap and stock.
///
/// # Errors
///
/// Returns [`CartError`] when the quantity is below 1, above
/// [`MAX_LINE_QUANTITY`], or above `stock`.
pub const fn check_quantity(requested: i32, stock: i32) -> Result<(), CartError> {
    if requested < 1 {
        return Err(CartError::InvalidQuantity);
    }
    if requested > MAX_LINE_QUANTITY {
        return Err(CartError::LineLimit {
            max: MAX_LINE_QUANTITY,
        });
    }
    if requested > stock {
        return Err(CartError::InsufficientStock {
            available: if stock < 0 { 0 } else { stock },
        });
    }
    Ok(())
}

/// A product and quantity held in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A write needed to fold an anonymous cart into a user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// The user already holds the product; set the summed quantity.
    Update { product_id: ProductId, quantity: i32 },
    /// New to the user's cart.
    Insert { product_id: ProductId, quantity: i32 },
}

/// Plan the merge of `anonymous` lines into `existing` user lines.
///
/// Shared products get their quantities summed; everything else is
/// inserted. Order follows the anonymous cart.
#[must_use]
pub fn merge_lines(existing: &[CartLine], anonymous: &[CartLine]) -> Vec<MergeAction> {
    let mut held: HashMap<ProductId, i32> = existing
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();

    let mut actions = Vec::with_capacity(anonymous.len());
    for line in anonymous {
        if let Some(current) = held.get_mut(&line.product_id) {
            *current += line.quantity;
            actions.push(MergeAction::Update {
                product_id: line.product_id,
                quantity: *current,
            });
        } else {
            held.insert(line.product_id, line.quantity);
            actions.push(MergeAction::Insert {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_merge_sums_shared_products() {
        let existing = [line(1, 2), line(2, 1)];
        let anonymous = [line(1, 3), line(3, 1)];

        assert_eq!(
            merge_lines(&existing, &anonymous),
            vec![
                MergeAction::Update {
                    product_id: ProductId::new(1),
                    quantity: 5
                },
                MergeAction::Insert {
                    product_id: ProductId::new(3),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_merge_into_empty_cart_inserts_everything() {
        let anonymous = [line(7, 1), line(8, 4)];
        let actions = merge_lines(&[], &anonymous);
        assert!(actions
            .iter()
            .all(|a| matches!(a, MergeAction::Insert { .. })));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_merge_empty_anonymous_cart_is_noop() {
        assert!(merge_lines(&[line(1, 1)], &[]).is_empty());
    }

    #[test]
    fn test_adding_more_than_stock_fails() {
        assert_eq!(
            check_quantity(4, 3),
            Err(CartError::InsufficientStock { available: 3 })
        );
        assert_eq!(
            check_quantity(1, 0),
            Err(CartError::InsufficientStock { available: 0 })
        );
        assert_eq!(check_quantity(3, 3), Ok(()));
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(check_quantity(0, 5), Err(CartError::InvalidQuantity));
        assert_eq!(
            check_quantity(11, 100),
            Err(CartError::LineLimit { max: 10 })
        );
    }
}
