use ragdesk::domains::chat::{ChatMode, Reaction, Role, DEFAULT_CHAT_TITLE};
use ragdesk::domains::preferences::{ColorPalette, Theme, UserPreferences};
use ragdesk::error::RagDeskError;
use ragdesk::store::ChatStore;

#[test]
fn create_select_and_delete_chats() {
    let mut store = ChatStore::default();
    assert!(store.is_empty());
    assert!(store.active_chat().is_none());

    let first = store.create_chat(ChatMode::Chat, None);
    let second = store.create_chat(ChatMode::Rag, Some("Research"));
    assert_eq!(store.len(), 2);
    assert_eq!(store.active_chat_id(), Some(second.as_str()));
    assert_eq!(store.chat(&first).unwrap().title, DEFAULT_CHAT_TITLE);
    assert_eq!(store.chat(&second).unwrap().mode, ChatMode::Rag);

    store.select_chat(&first).unwrap();
    assert_eq!(store.active_chat_id(), Some(first.as_str()));
    assert!(matches!(store.select_chat("nope"), Err(RagDeskError::NotFound(_))));

    let removed = store.delete_chat(&first).unwrap();
    assert_eq!(removed.id, first);
    assert_eq!(store.active_chat_id(), Some(second.as_str()));

    store.delete_chat(&second).unwrap();
    assert!(store.active_chat_id().is_none());
    assert!(store.delete_chat(&second).is_err());
}

#[test]
fn chats_are_listed_most_recent_first() {
    let mut store = ChatStore::default();
    let a = store.create_chat(ChatMode::Chat, Some("a"));
    let b = store.create_chat(ChatMode::Chat, Some("b"));
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.add_message(&a, Role::User, "bump", None).unwrap();
    let order: Vec<&str> = store.chats().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, vec![a.as_str(), b.as_str()]);
}

#[test]
fn first_user_message_titles_the_chat() {
    let mut store = ChatStore::default();
    let id = store.create_chat(ChatMode::Chat, None);
    store
        .add_message(&id, Role::User, "How do refunds work?\nDetails follow", None)
        .unwrap();
    store.add_message(&id, Role::User, "Second question", None).unwrap();
    assert_eq!(store.chat(&id).unwrap().title, "How do refunds work?");

    let named = store.create_chat(ChatMode::Chat, Some("Kept"));
    store.add_message(&named, Role::User, "anything", None).unwrap();
    assert_eq!(store.chat(&named).unwrap().title, "Kept");
}

#[test]
fn messages_thread_edit_and_delete() {
    let mut store = ChatStore::default();
    let id = store.create_chat(ChatMode::Chat, None);
    let question = store.add_message(&id, Role::User, "q", None).unwrap();
    let answer = store
        .add_message(&id, Role::Assistant, "a", Some(&question))
        .unwrap();
    assert!(store
        .add_message(&id, Role::Assistant, "x", Some("missing"))
        .is_err());

    assert_eq!(store.replies(&id, &question).unwrap().len(), 1);

    store.edit_message(&id, &answer, "a").unwrap();
    assert!(!store.chat(&id).unwrap().message(&answer).unwrap().edited);
    store.edit_message(&id, &answer, "better").unwrap();
    let edited = store.chat(&id).unwrap().message(&answer).unwrap();
    assert!(edited.edited);
    assert_eq!(edited.content, "better");

    store.delete_message(&id, &question).unwrap();
    let chat = store.chat(&id).unwrap();
    assert_eq!(chat.messages.len(), 1);
    assert!(chat.messages[0].parent_id.is_none());
}

#[test]
fn reactions_toggle_independently() {
    let mut store = ChatStore::default();
    let id = store.create_chat(ChatMode::Chat, None);
    let msg = store.add_message(&id, Role::Assistant, "a", None).unwrap();

    assert!(store.toggle_reaction(&id, &msg, Reaction::ThumbsUp).unwrap());
    assert!(store.toggle_reaction(&id, &msg, Reaction::Star).unwrap());
    let message = store.chat(&id).unwrap().message(&msg).unwrap();
    assert!(message.has_reaction(Reaction::ThumbsUp));
    assert!(message.has_reaction(Reaction::Star));

    assert!(!store.toggle_reaction(&id, &msg, Reaction::ThumbsUp).unwrap());
    let message = store.chat(&id).unwrap().message(&msg).unwrap();
    assert!(!message.has_reaction(Reaction::ThumbsUp));
    assert!(message.has_reaction(Reaction::Star));
}

#[test]
fn mode_change_carries_default_prompt() {
    let mut store = ChatStore::default();
    let id = store.create_chat(ChatMode::Chat, None);
    store.set_chat_mode(&id, ChatMode::Rag).unwrap();
    let chat = store.chat(&id).unwrap();
    assert_eq!(
        chat.system_prompt.as_deref(),
        store.preferences().system_prompt_for(ChatMode::Rag)
    );

    store
        .set_system_prompt(&id, Some("Custom".to_string()))
        .unwrap();
    store.set_chat_mode(&id, ChatMode::Summarize).unwrap();
    assert_eq!(store.chat(&id).unwrap().system_prompt.as_deref(), Some("Custom"));
}

#[test]
fn documents_are_deduplicated_and_detached() {
    let mut store = ChatStore::default();
    let a = store.create_chat(ChatMode::Rag, None);
    let b = store.create_chat(ChatMode::Rag, None);
    store
        .set_chat_documents(&a, vec!["d1".into(), "d2".into(), "d1".into()])
        .unwrap();
    store.set_chat_documents(&b, vec!["d2".into()]).unwrap();
    assert_eq!(store.chat(&a).unwrap().document_ids, vec!["d1", "d2"]);

    let mut touched = store.detach_document("d2");
    touched.sort();
    let mut expected = vec![a.clone(), b.clone()];
    expected.sort();
    assert_eq!(touched, expected);
    assert_eq!(store.chat(&a).unwrap().document_ids, vec!["d1"]);
    assert!(store.chat(&b).unwrap().document_ids.is_empty());
}

#[test]
fn preferences_validate_palette() {
    let mut store = ChatStore::new(UserPreferences::default());
    store.set_theme(Theme::Dark);
    assert_eq!(store.preferences().theme, Theme::Dark);

    let bad = ColorPalette {
        primary: "blue".to_string(),
        ..ColorPalette::default()
    };
    assert!(matches!(
        store.set_custom_palette(bad),
        Err(RagDeskError::Validation(_))
    ));
    store.set_custom_palette(ColorPalette::default()).unwrap();
    assert!(store.preferences().custom_palette.is_some());
    store.reset_palette();
    assert!(store.preferences().custom_palette.is_none());

    store.set_default_system_prompt(ChatMode::Search, "List passages");
    assert_eq!(
        store.preferences().system_prompt_for(ChatMode::Search),
        Some("List passages")
    );
    assert!(store.rename_chat("missing", "x").is_err());
}
