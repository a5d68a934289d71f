use super::catalog::CartLine;

/// Outcome of a COD eligibility sweep over a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodVerdict {
    pub allowed: bool,
    /// Name of the first product that blocks COD
    pub blocking_product: Option<String>,
    pub reason: Option<String>,
}

impl CodVerdict {
    fn allowed() -> Self {
        Self {
            allowed: true,
            blocking_product: None,
            reason: None,
        }
    }

    fn denied(product: &str, reason: String) -> Self {
        Self {
            allowed: false,
            blocking_product: Some(product.to_string()),
            reason: Some(reason),
        }
    }
}

/// A cart is COD-eligible iff every product allows COD and every assigned
/// supplier supports it. Products without a supplier never block COD.
/// Stops at the first line that disallows it.
pub fn evaluate(lines: &[CartLine]) -> CodVerdict {
    for line in lines {
        let product = &line.product;
        if !product.cod_allowed {
            return CodVerdict::denied(
                &product.name,
                format!("COD not available for {}.", product.name),
            );
        }
        if let Some(supplier) = &product.supplier {
            if !supplier.supports_cod {
                return CodVerdict::denied(
                    &product.name,
                    format!(
                        "COD not available for {} (supplier {} does not support COD).",
                        product.name, supplier.name
                    ),
                );
            }
        }
    }
    CodVerdict::allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::{ProductSnapshot, SupplierSnapshot};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn line(name: &str, cod_allowed: bool, supplier_cod: Option<bool>) -> CartLine {
        CartLine {
            cart_item_id: Uuid::new_v4(),
            quantity: 1,
            product: ProductSnapshot {
                id: Uuid::new_v4(),
                name: name.to_string(),
                price: dec!(10.00),
                stock: Some(5),
                cod_allowed,
                dropship_cost: None,
                supplier: supplier_cod.map(|supports_cod| SupplierSnapshot {
                    id: Uuid::new_v4(),
                    name: format!("{} Supplier", name),
                    supports_cod,
                    lead_time_days: 2,
                }),
            },
        }
    }

    #[test]
    fn all_lines_eligible() {
        let verdict = evaluate(&[line("P1", true, Some(true)), line("P2", true, None)]);
        assert!(verdict.allowed);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn product_flag_blocks_cod() {
        let verdict = evaluate(&[line("P1", true, None), line("P2", false, None)]);
        assert!(!verdict.allowed);
        assert_eq!(verdict.blocking_product.as_deref(), Some("P2"));
        assert_eq!(verdict.reason.as_deref(), Some("COD not available for P2."));
    }

    #[test]
    fn supplier_without_cod_blocks_and_names_product() {
        let verdict = evaluate(&[line("Lamp", true, Some(false))]);
        assert!(!verdict.allowed);
        assert_eq!(verdict.blocking_product.as_deref(), Some("Lamp"));
        assert!(verdict.reason.unwrap().contains("Lamp"));
    }

    #[test]
    fn reports_first_offending_line_only() {
        let verdict = evaluate(&[
            line("A", true, Some(true)),
            line("B", false, None),
            line("C", false, None),
        ]);
        assert_eq!(verdict.blocking_product.as_deref(), Some("B"));
    }

    #[test]
    fn empty_cart_is_trivially_eligible() {
        assert!(evaluate(&[]).allowed);
    }
}
