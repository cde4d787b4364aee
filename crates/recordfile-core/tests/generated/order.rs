const ADDRESS_SCHEMA: &str = r#"{"type":"record","name":"Address","namespace":"com.example.shop","fields":[{"name":"city","type":"string","doc":"City name"}]}"#;

recordfile_core::static_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Address: ADDRESS_SCHEMA, builder = AddressBuilder {
        /// City name
        pub city: String,
    }
}

const ORDER_SCHEMA: &str = r#"{"type":"record","name":"Order","namespace":"com.example.shop","doc":"An order","fields":[{"name":"id","type":"long"},{"name":"type","type":"string","default":"retail"},{"name":"shipping","type":{"type":"record","name":"Address","namespace":"com.example.shop","fields":[{"name":"city","type":"string","doc":"City name"}]}}]}"#;

recordfile_core::static_record! {
    /// An order
    #[derive(Debug, Clone, PartialEq)]
    pub struct Order: ORDER_SCHEMA, builder = OrderBuilder {
        pub id: i64,
        pub r#type: String,
        pub shipping: Address,
    }
}
