table! {
    competition (id) {
        id -> Int4,
        created_at -> Timestamptz,
        game_id -> Int4,
        start_date -> Timestamptz,
        end_date -> Timestamptz,
        status_id -> Int4,
    }
}

table! {
    competition_player (id) {
        id -> Int4,
        competition_id -> Int4,
        steam_id -> Nullable<Text>,
    }
}

table! {
    competition_vote (id) {
        id -> Int4,
        created_at -> Timestamptz,
        competition_id -> Int4,
        steam_id -> Text,
        positive -> Bool,
    }
}

table! {
    game (id) {
        id -> Int4,
        app_id -> Int4,
        name -> Text,
    }
}

table! {
    steam_user (id) {
        id -> Int4,
        steam_id -> Text,
        steam_name -> Nullable<Text>,
    }
}

table! {
    user_game_info (id) {
        id -> Int4,
        user_id -> Int4,
        game_id -> Int4,
        playtime_minutes -> Int4,
    }
}

joinable!(competition -> game (game_id));
joinable!(competition_player -> competition (competition_id));
joinable!(competition_vote -> competition (competition_id));
joinable!(user_game_info -> game (game_id));
joinable!(user_game_info -> steam_user (user_id));

allow_tables_to_appear_in_same_query!(
    competition,
    competition_player,
    competition_vote,
    game,
    steam_user,
    user_game_info,
);
