// Table definitions matching the DDL in `db::init_tables`.

diesel::table! {
    roles (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Text,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        full_name -> Text,
        role_id -> Text,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    advisors (id) {
        id -> Text,
        user_id -> Text,
        lecturer_number -> Text,
        department -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    students (id) {
        id -> Text,
        user_id -> Text,
        student_number -> Text,
        program_study -> Text,
        academic_year -> Text,
        advisor_id -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    achievement_references (id) {
        id -> Text,
        student_id -> Text,
        content_ref -> Text,
        status -> Text,
        rejection_note -> Nullable<Text>,
        verified_by -> Nullable<Text>,
        verified_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    achievement_histories (id) {
        id -> Integer,
        achievement_id -> Text,
        changed_by -> Text,
        previous_status -> Text,
        new_status -> Text,
        remarks -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::joinable!(users -> roles (role_id));
diesel::joinable!(students -> advisors (advisor_id));
diesel::joinable!(students -> users (user_id));
diesel::joinable!(advisors -> users (user_id));
diesel::joinable!(achievement_histories -> achievement_references (achievement_id));

diesel::allow_tables_to_appear_in_same_query!(
    roles,
    users,
    advisors,
    students,
    achievement_references,
    achievement_histories,
);
