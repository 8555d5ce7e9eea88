table! {
    books (isbn) {
        isbn -> Varchar,
        title -> Varchar,
        author -> Varchar,
        year -> Int2,
    }
}

table! {
    reviews (id) {
        id -> Int4,
        user_id -> Int4,
        isbn -> Varchar,
        rating -> Int2,
        review_text -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        password_hash -> Varchar,
    }
}

joinable!(reviews -> books (isbn));
joinable!(reviews -> users (user_id));

allow_tables_to_appear_in_same_query!(
    books,
    reviews,
    users,
);
