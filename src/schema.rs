// diagtree schema - key/value slot table for Diesel ORM

diesel::table! {
    storage_slots (name) {
        name -> Text,
        payload -> Text,
        updated_at -> Text,
    }
}
