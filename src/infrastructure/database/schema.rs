diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::*;

    chunk_associations (global_file_hash, chunk_hash) {
        global_file_hash -> Text,
        chunk_hash -> Text,
        chunk_index -> Int4,
        chunk_metadata -> Jsonb,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::*;

    files (id) {
        id -> Uuid,
        user_id -> Text,
        filename -> Text,
        content_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::*;

    global_chunks (hash) {
        hash -> Text,
        content -> Text,
        embedding -> Vector,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use pgvector::sql_types::*;

    global_files (hash) {
        hash -> Text,
        size -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(chunk_associations -> global_chunks (chunk_hash));
diesel::joinable!(chunk_associations -> global_files (global_file_hash));
diesel::joinable!(files -> global_files (content_hash));

diesel::allow_tables_to_appear_in_same_query!(
    chunk_associations,
    files,
    global_chunks,
    global_files,
);
