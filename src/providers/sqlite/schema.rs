diesel::table! {
    documents (collection, doc_id) {
        collection -> Text,
        doc_id -> Text,
        body -> Text,
        updated_at -> BigInt,
    }
}
