//! Fixed warehouse schemas provisioned for every tenant.
//!
//! Event tables share nested record definitions (event params, user data,
//! commerce records, geo and device info). Tables carrying a `date` column
//! are partitioned by day on it, see [`date_partitioning`].

use crate::warehouse::{FieldType, TableField, TimePartitioning};

/// Query behind the excluded-referrers view.
pub const EXCLUDED_REFERRERS_VIEW_QUERY: &str = "select ['https://some-site.com/'] as hosts";

fn string(name: &str) -> TableField {
    TableField::new(name, FieldType::String)
}

fn integer(name: &str) -> TableField {
    TableField::new(name, FieldType::Integer)
}

fn float(name: &str) -> TableField {
    TableField::new(name, FieldType::Float)
}

fn boolean(name: &str) -> TableField {
    TableField::new(name, FieldType::Boolean)
}

/// One value column per supported scalar type; exactly one is set per row.
fn typed_value_fields() -> Vec<TableField> {
    vec![
        string("string_value"),
        integer("int_value"),
        float("float_value"),
        float("double_value"),
        boolean("bool_value"),
    ]
}

fn key_typed_value_fields() -> Vec<TableField> {
    vec![
        string("key"),
        TableField::record("value", typed_value_fields()),
    ]
}

fn key_string_value_fields() -> Vec<TableField> {
    vec![string("key"), string("value")]
}

fn custom_params() -> TableField {
    TableField::record("custom_params", key_typed_value_fields()).repeated()
}

fn user_data() -> TableField {
    TableField::record(
        "user_data",
        vec![
            string("first_name"),
            string("last_name"),
            string("full_name"),
            string("gender"),
            integer("age"),
            string("phone_number"),
            string("email"),
            string("country"),
            string("region"),
            string("city"),
        ],
    )
}

fn deal() -> TableField {
    TableField::record(
        "deal",
        vec![
            string("id"),
            string("name"),
            string("status"),
            string("manager"),
            float("value"),
            string("currency"),
            custom_params(),
        ],
    )
}

fn offers() -> TableField {
    TableField::record(
        "offers",
        vec![
            string("id"),
            string("name"),
            float("value"),
            string("currency"),
            string("promo_action"),
            float("discount_amount"),
            float("discount_percentage"),
        ],
    )
    .repeated()
}

fn order() -> TableField {
    TableField::record(
        "order",
        vec![
            string("id"),
            string("status"),
            string("manager"),
            float("value"),
            float("paid_value"),
            float("refund_value"),
            string("currency"),
            float("shipping"),
            float("tax"),
            string("promo_action"),
            float("discount_amount"),
            float("discount_percentage"),
            string("payment_method"),
            custom_params(),
        ],
    )
}

fn products() -> TableField {
    TableField::record(
        "products",
        vec![
            string("id"),
            string("name"),
            string("brand"),
            string("category"),
            string("sku"),
            integer("quantity"),
            float("value"),
            string("currency"),
            string("promo_action"),
            float("discount_amount"),
            float("discount_percentage"),
        ],
    )
    .repeated()
}

fn transaction() -> TableField {
    TableField::record(
        "transaction",
        vec![
            string("id"),
            string("status"),
            float("value"),
            string("currency"),
            float("tax"),
            string("payment_method"),
            string("deal_id"),
            string("order_id"),
            custom_params(),
        ],
    )
}

fn geo() -> TableField {
    TableField::record(
        "geo",
        vec![
            string("continent"),
            string("sub_continent"),
            string("country"),
            string("region"),
            string("city"),
        ],
    )
}

fn device_info() -> TableField {
    TableField::record(
        "device_info",
        vec![
            string("category"),
            string("mobile_brand_name"),
            string("mobile_model_name"),
            string("operating_system"),
            string("operating_system_version"),
            string("language"),
            string("timezone"),
            integer("timezone_offset_seconds"),
            string("ip"),
            string("screen_resolution"),
            TableField::record(
                "web_info",
                vec![
                    string("browser"),
                    string("browser_version"),
                    string("user_agent"),
                ],
            ),
        ],
    )
}

/// Collected events as written by the collector topic's warehouse sink.
#[must_use]
pub fn raw_events() -> Vec<TableField> {
    vec![
        TableField::new("date", FieldType::Date),
        integer("timestamp"),
        string("event_id"),
        string("event_name"),
        TableField::record("event_params", key_typed_value_fields()).repeated(),
        user_data(),
        TableField::record("user_properties", key_typed_value_fields()).repeated(),
        TableField::record("user_external_ids", key_string_value_fields()).repeated(),
        string("strimix_avid"),
        TableField::record(
            "ad_data",
            vec![
                string("ad_network"),
                TableField::record("values", key_string_value_fields()).repeated(),
            ],
        )
        .repeated(),
        deal(),
        offers(),
        order(),
        products(),
        transaction(),
        geo(),
        device_info(),
        boolean("is_test_event"),
    ]
}

/// Raw events enriched with the identity resolved for the visitor.
#[must_use]
pub fn identified_events() -> Vec<TableField> {
    let mut fields = raw_events();
    fields.extend([
        string("user_id"),
        integer("identified_at"),
        TableField::record(
            "identity",
            vec![string("source"), string("matched_on"), float("confidence")],
        ),
    ]);
    fields
}

/// Daily ad network spend rows.
#[must_use]
pub fn ad_costs() -> Vec<TableField> {
    vec![
        integer("inserted_at"),
        TableField::new("date", FieldType::Date),
        string("ad_account_id"),
        string("timezone"),
        string("source"),
        string("medium"),
        string("campaign"),
        string("content"),
        string("term"),
        string("strimix_refid"),
        string("landing_page_url"),
        string("landing_hostname"),
        string("landing_page_path"),
        TableField::record(
            "url_params",
            vec![
                string("key"),
                TableField::record("value", vec![string("string_value")]),
            ],
        )
        .repeated(),
        float("cost"),
        string("currency"),
        integer("impressions"),
        integer("reach"),
        integer("clicks"),
        boolean("click_delay"),
        string("ad_id"),
        string("keyword"),
    ]
}

/// Day partitioning on the `date` column with a required partition filter.
#[must_use]
pub fn date_partitioning() -> TimePartitioning {
    TimePartitioning::daily("date")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::FieldMode;

    fn names(fields: &[TableField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn find<'a>(fields: &'a [TableField], name: &str) -> &'a TableField {
        fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("missing field {name}"))
    }

    #[test]
    fn raw_events_starts_with_partition_column() {
        let fields = raw_events();
        assert_eq!(
            &names(&fields)[..4],
            &["date", "timestamp", "event_id", "event_name"]
        );
        assert_eq!(find(&fields, "date").field_type, FieldType::Date);
        assert_eq!(fields.last().map(|f| f.name.as_str()), Some("is_test_event"));
    }

    #[test]
    fn event_params_are_repeated_typed_values() {
        let fields = raw_events();
        let params = find(&fields, "event_params");
        assert_eq!(params.mode, FieldMode::Repeated);
        let value = find(&params.fields, "value");
        assert_eq!(
            names(&value.fields),
            vec![
                "string_value",
                "int_value",
                "float_value",
                "double_value",
                "bool_value"
            ]
        );
    }

    #[test]
    fn identified_events_extend_raw_events() {
        let raw = raw_events();
        let identified = identified_events();
        assert_eq!(&identified[..raw.len()], &raw[..]);
        assert!(identified.iter().any(|f| f.name == "user_id"));
    }

    #[test]
    fn column_names_are_unique() {
        for schema in [raw_events(), identified_events(), ad_costs()] {
            let mut seen = std::collections::HashSet::new();
            for field in &schema {
                assert!(seen.insert(field.name.clone()), "duplicate {}", field.name);
            }
        }
    }

    #[test]
    fn ad_costs_has_date_column() {
        let fields = ad_costs();
        assert_eq!(find(&fields, "date").field_type, FieldType::Date);
        assert_eq!(find(&fields, "cost").field_type, FieldType::Float);
        assert_eq!(date_partitioning().field, "date");
    }
}
