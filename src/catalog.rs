use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: u32,
    pub name: &'static str,
    pub price: f64,
    pub image: &'static str,
}

/// Indexed by the class id the detection model was trained with.
static PRODUCTS: [Product; 4] = [
    Product {
        id: 101,
        name: "Sapolio",
        price: 5.50,
        image: "🧼",
    },
    Product {
        id: 102,
        name: "Piqueo",
        price: 8.90,
        image: "🍟",
    },
    Product {
        id: 103,
        name: "Oreo",
        price: 2.50,
        image: "🍪",
    },
    Product {
        id: 104,
        name: "Frugos",
        price: 4.20,
        image: "🧃",
    },
];

pub fn get_product(class_id: usize) -> Option<&'static Product> {
    PRODUCTS.get(class_id)
}

pub fn find_by_product_id(id: u32) -> Option<&'static Product> {
    PRODUCTS.iter().find(|product| product.id == id)
}

pub fn all_products() -> &'static [Product] {
    &PRODUCTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_class_is_sapolio() {
        let product = get_product(0).unwrap();
        assert_eq!(product.id, 101);
        assert_eq!(product.name, "Sapolio");
        assert_eq!(product.price, 5.50);
        assert_eq!(product.image, "🧼");
    }

    #[test]
    fn unknown_class_ids_are_absent() {
        for class_id in [4, 5, 80, usize::MAX] {
            assert!(get_product(class_id).is_none(), "class {class_id}");
        }
    }

    #[test]
    fn lookups_are_stable() {
        for class_id in 0..all_products().len() {
            let first = get_product(class_id).map(|p| p.id);
            let second = get_product(class_id).map(|p| p.id);
            assert!(first.is_some());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn product_ids_resolve_back_to_catalog_entries() {
        assert_eq!(find_by_product_id(103).map(|p| p.name), Some("Oreo"));
        assert!(find_by_product_id(0).is_none());
    }

    #[test]
    fn serializes_with_plain_field_names() {
        let json = serde_json::to_value(get_product(0).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": 101, "name": "Sapolio", "price": 5.5, "image": "🧼" })
        );
    }
}
