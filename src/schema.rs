// Intake schema - idea, attachment and vote tables for Diesel ORM

diesel::table! {
    schema_versions (id) {
        id -> Integer,
        version -> Text,
        name -> Text,
        features -> Text,
        introduced_at -> Text,
    }
}

diesel::table! {
    ideas (id) {
        id -> Integer,
        title -> Text,
        problem -> Text,
        desired_outcome -> Text,
        category -> Text,
        department -> Text,
        impact_type -> Nullable<Text>,
        automation_fit -> Nullable<Text>,
        status -> Text,
        score -> Integer,
        author_id -> Text,
        author_name -> Text,
        author_email -> Nullable<Text>,
        author_photo -> Nullable<Text>,
        process_frequency -> Nullable<Text>,
        time_spent_hours_per_week -> Nullable<Double>,
        estimated_benefit -> Nullable<Text>,
        review_notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
        revision -> Integer,
    }
}

diesel::table! {
    idea_attachments (id) {
        id -> Integer,
        idea_id -> Integer,
        name -> Text,
        url -> Text,
        mime_type -> Text,
        size_bytes -> BigInt,
        storage_key -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    votes (idea_id, voter_id) {
        idea_id -> Integer,
        voter_id -> Text,
        direction -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(idea_attachments -> ideas (idea_id));
diesel::joinable!(votes -> ideas (idea_id));

diesel::allow_tables_to_appear_in_same_query!(
    schema_versions,
    ideas,
    idea_attachments,
    votes,
);
