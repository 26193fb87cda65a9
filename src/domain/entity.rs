//! Entity kinds, data type selectors, and per-kind record schemas
//!
//! Records coming out of the shop database are loosely typed maps. Each one is
//! tagged with an [`EntityKind`], and each kind has a fixed set of required
//! fields described by an [`EntitySchema`]. The schema table is the single
//! place kind-specific validation is looked up.

use crate::domain::errors::VaultError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain record type stored by the point-of-sale application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Sellable product
    Product,
    /// Product category
    Category,
    /// Product supplier
    Supplier,
    /// Completed sale
    Sale,
    /// Line item of a sale
    SaleItem,
    /// Customer
    Customer,
    /// Expense entry
    Expense,
    /// Expense category
    ExpenseCategory,
    /// Stock movement (in, out, adjustment)
    StockMovement,
    /// Quantity-based price tier of a product
    BulkPricingTier,
}

impl EntityKind {
    /// All kinds in import dependency order (referenced kinds first)
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Category,
        EntityKind::Supplier,
        EntityKind::Product,
        EntityKind::BulkPricingTier,
        EntityKind::Customer,
        EntityKind::Sale,
        EntityKind::SaleItem,
        EntityKind::ExpenseCategory,
        EntityKind::Expense,
        EntityKind::StockMovement,
    ];

    /// Key under which records of this kind live in a snapshot's data section
    pub fn data_key(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Category => "categories",
            EntityKind::Supplier => "suppliers",
            EntityKind::Sale => "sales",
            EntityKind::SaleItem => "saleItems",
            EntityKind::Customer => "customers",
            EntityKind::Expense => "expenses",
            EntityKind::ExpenseCategory => "expenseCategories",
            EntityKind::StockMovement => "stockMovements",
            EntityKind::BulkPricingTier => "bulkPricingTiers",
        }
    }

    /// Looks a kind up by its data section key
    pub fn from_data_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.data_key() == key)
    }

    /// Snake_case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::Supplier => "supplier",
            EntityKind::Sale => "sale",
            EntityKind::SaleItem => "sale_item",
            EntityKind::Customer => "customer",
            EntityKind::Expense => "expense",
            EntityKind::ExpenseCategory => "expense_category",
            EntityKind::StockMovement => "stock_movement",
            EntityKind::BulkPricingTier => "bulk_pricing_tier",
        }
    }

    /// Required-field schema for this kind
    pub fn schema(&self) -> &'static EntitySchema {
        &SCHEMAS[self.schema_index()]
    }

    fn schema_index(&self) -> usize {
        match self {
            EntityKind::Product => 0,
            EntityKind::Category => 1,
            EntityKind::Supplier => 2,
            EntityKind::Sale => 3,
            EntityKind::SaleItem => 4,
            EntityKind::Customer => 5,
            EntityKind::Expense => 6,
            EntityKind::ExpenseCategory => 7,
            EntityKind::StockMovement => 8,
            EntityKind::BulkPricingTier => 9,
        }
    }

    /// Kind referenced by a foreign-key field name, if it is a known relation
    pub fn referenced_by(field: &str) -> Option<EntityKind> {
        match field {
            "product_id" => Some(EntityKind::Product),
            "category_id" => Some(EntityKind::Category),
            "supplier_id" => Some(EntityKind::Supplier),
            "sale_id" => Some(EntityKind::Sale),
            "customer_id" => Some(EntityKind::Customer),
            "expense_category_id" => Some(EntityKind::ExpenseCategory),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type a required field must have after sanitizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Non-empty string
    Text,
    /// JSON number
    Numeric,
}

/// A field every record of a kind must carry
#[derive(Debug, Clone, Copy)]
pub struct RequiredField {
    /// Field name
    pub name: &'static str,
    /// Expected type
    pub field_type: FieldType,
}

/// Validation schema of an entity kind
#[derive(Debug)]
pub struct EntitySchema {
    /// Kind the schema belongs to
    pub kind: EntityKind,
    /// Fields that must be present
    pub required: &'static [RequiredField],
}

impl EntitySchema {
    /// Looks up a required field by name
    pub fn required_field(&self, name: &str) -> Option<&RequiredField> {
        self.required.iter().find(|field| field.name == name)
    }
}

const fn text(name: &'static str) -> RequiredField {
    RequiredField {
        name,
        field_type: FieldType::Text,
    }
}

const fn numeric(name: &'static str) -> RequiredField {
    RequiredField {
        name,
        field_type: FieldType::Numeric,
    }
}

static SCHEMAS: [EntitySchema; 10] = [
    EntitySchema {
        kind: EntityKind::Product,
        required: &[text("name"), numeric("price"), numeric("cost")],
    },
    EntitySchema {
        kind: EntityKind::Category,
        required: &[text("name")],
    },
    EntitySchema {
        kind: EntityKind::Supplier,
        required: &[text("name")],
    },
    EntitySchema {
        kind: EntityKind::Sale,
        required: &[numeric("total")],
    },
    EntitySchema {
        kind: EntityKind::SaleItem,
        required: &[text("product_id"), numeric("quantity"), numeric("price")],
    },
    EntitySchema {
        kind: EntityKind::Customer,
        required: &[text("name")],
    },
    EntitySchema {
        kind: EntityKind::Expense,
        required: &[numeric("amount")],
    },
    EntitySchema {
        kind: EntityKind::ExpenseCategory,
        required: &[text("name")],
    },
    EntitySchema {
        kind: EntityKind::StockMovement,
        required: &[
            text("product_id"),
            numeric("quantity"),
            text("movement_type"),
        ],
    },
    EntitySchema {
        kind: EntityKind::BulkPricingTier,
        required: &[
            text("product_id"),
            numeric("min_quantity"),
            numeric("price"),
        ],
    },
];

/// Columns that are coerced to numbers when they arrive as strings
pub const NUMERIC_COLUMNS: [&str; 6] = [
    "price",
    "cost",
    "quantity",
    "amount",
    "total",
    "min_quantity",
];

/// Export/import scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTypeSelector {
    /// Products with their categories, suppliers, and price tiers
    Products,
    /// Sales and their line items
    Sales,
    /// Customers
    Customers,
    /// Expenses and expense categories
    Expenses,
    /// Stock movements
    StockMovements,
    /// Bulk-pricing tiers only
    BulkPricing,
    /// Everything
    Complete,
}

impl DataTypeSelector {
    /// All selectors
    pub const ALL: [DataTypeSelector; 7] = [
        DataTypeSelector::Products,
        DataTypeSelector::Sales,
        DataTypeSelector::Customers,
        DataTypeSelector::Expenses,
        DataTypeSelector::StockMovements,
        DataTypeSelector::BulkPricing,
        DataTypeSelector::Complete,
    ];

    /// Entity kinds an envelope of this selector carries, in dependency order
    pub fn allowed_kinds(&self) -> &'static [EntityKind] {
        match self {
            DataTypeSelector::Products => &[
                EntityKind::Category,
                EntityKind::Supplier,
                EntityKind::Product,
                EntityKind::BulkPricingTier,
            ],
            DataTypeSelector::Sales => &[EntityKind::Sale, EntityKind::SaleItem],
            DataTypeSelector::Customers => &[EntityKind::Customer],
            DataTypeSelector::Expenses => &[EntityKind::ExpenseCategory, EntityKind::Expense],
            DataTypeSelector::StockMovements => &[EntityKind::StockMovement],
            DataTypeSelector::BulkPricing => &[EntityKind::BulkPricingTier],
            DataTypeSelector::Complete => &EntityKind::ALL,
        }
    }

    /// Whether records of `kind` belong in this selector's envelope
    pub fn allows(&self, kind: EntityKind) -> bool {
        self.allowed_kinds().contains(&kind)
    }

    /// Validation rule manifest written into the integrity block
    pub fn validation_rules(&self) -> &'static [&'static str] {
        match self {
            DataTypeSelector::Products => &[
                "required_fields",
                "positive_prices",
                "non_negative_costs",
                "valid_categories",
                "valid_suppliers",
            ],
            DataTypeSelector::Sales => &[
                "required_fields",
                "valid_sale_totals",
                "positive_quantities",
                "valid_sale_references",
            ],
            DataTypeSelector::Customers => &["required_fields", "valid_customer_names"],
            DataTypeSelector::Expenses => &[
                "required_fields",
                "positive_amounts",
                "valid_expense_categories",
            ],
            DataTypeSelector::StockMovements => &[
                "required_fields",
                "valid_movement_types",
                "valid_product_references",
            ],
            DataTypeSelector::BulkPricing => &[
                "required_fields",
                "positive_prices",
                "positive_min_quantities",
            ],
            DataTypeSelector::Complete => &[
                "required_fields",
                "positive_prices",
                "valid_categories",
                "valid_sale_references",
                "positive_amounts",
                "valid_movement_types",
            ],
        }
    }

    /// Snake_case name, as used in file names and the `dataType` field
    pub fn as_str(&self) -> &'static str {
        match self {
            DataTypeSelector::Products => "products",
            DataTypeSelector::Sales => "sales",
            DataTypeSelector::Customers => "customers",
            DataTypeSelector::Expenses => "expenses",
            DataTypeSelector::StockMovements => "stock_movements",
            DataTypeSelector::BulkPricing => "bulk_pricing",
            DataTypeSelector::Complete => "complete",
        }
    }

    /// Names of every selector, for remediation hints
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for DataTypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataTypeSelector {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|selector| selector.as_str() == normalized)
            .ok_or_else(|| {
                VaultError::Validation(format!(
                    "Invalid data type '{s}'. Must be one of: {}",
                    Self::names().join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataTypeSelector::Products, 4)]
    #[test_case(DataTypeSelector::Sales, 2)]
    #[test_case(DataTypeSelector::Customers, 1)]
    #[test_case(DataTypeSelector::Expenses, 2)]
    #[test_case(DataTypeSelector::StockMovements, 1)]
    #[test_case(DataTypeSelector::BulkPricing, 1)]
    #[test_case(DataTypeSelector::Complete, 10)]
    fn test_allowed_kind_counts(selector: DataTypeSelector, expected: usize) {
        assert_eq!(selector.allowed_kinds().len(), expected);
    }

    #[test]
    fn test_products_bundle() {
        let products = DataTypeSelector::Products;
        assert!(products.allows(EntityKind::Product));
        assert!(products.allows(EntityKind::BulkPricingTier));
        assert!(!products.allows(EntityKind::Sale));
    }

    #[test]
    fn test_data_keys_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_data_key(kind.data_key()), Some(kind));
        }
        assert_eq!(EntityKind::from_data_key("widgets"), None);
    }

    #[test]
    fn test_schema_lookup_matches_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.schema().kind, kind);
            assert!(!kind.schema().required.is_empty());
        }
        let product = EntityKind::Product.schema();
        assert_eq!(
            product.required_field("price").map(|f| f.field_type),
            Some(FieldType::Numeric)
        );
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!(
            "stock-movements".parse::<DataTypeSelector>().unwrap(),
            DataTypeSelector::StockMovements
        );
        assert_eq!(
            " Complete ".parse::<DataTypeSelector>().unwrap(),
            DataTypeSelector::Complete
        );
        let err = "widgets".parse::<DataTypeSelector>().unwrap_err();
        assert!(err.to_string().contains("products, sales"));
    }

    #[test]
    fn test_selector_serde_names() {
        let json = serde_json::to_string(&DataTypeSelector::BulkPricing).unwrap();
        assert_eq!(json, "\"bulk_pricing\"");
    }

    #[test]
    fn test_referenced_by() {
        assert_eq!(EntityKind::referenced_by("sale_id"), Some(EntityKind::Sale));
        assert_eq!(EntityKind::referenced_by("device_id"), None);
    }
}
