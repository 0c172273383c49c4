mod common;

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;

use common::{chunk, MockKnowledge, MockLlm, Script};
use ragdesk::domains::chat::{ChatMode, Reaction, Role};
use ragdesk::error::RagDeskError;
use ragdesk::interfaces::providers::DocumentStore;
use ragdesk::providers::memory::InMemoryDocumentStore;
use ragdesk::services::chat::{ChatOptions, ChatService};
use ragdesk::services::notifications::{NoticeLevel, Notifier};
use ragdesk::services::sync::{StoreSync, CHATS_COLLECTION};
use ragdesk::store::ChatStore;

struct Harness {
    service: ChatService,
    llm: Arc<MockLlm>,
    knowledge: Arc<MockKnowledge>,
    store: Arc<InMemoryDocumentStore>,
    notifier: Notifier,
}

fn harness(llm: MockLlm, knowledge: MockKnowledge) -> Harness {
    let llm = Arc::new(llm);
    let knowledge = Arc::new(knowledge);
    let store = Arc::new(InMemoryDocumentStore::new());
    let sync = Arc::new(StoreSync::new(store.clone(), "u1"));
    let notifier = Notifier::default();
    let service = ChatService::new(
        llm.clone(),
        knowledge.clone(),
        Arc::new(RwLock::new(ChatStore::default())),
        Some(sync),
        notifier.clone(),
        ChatOptions::default(),
    );
    Harness {
        service,
        llm,
        knowledge,
        store,
        notifier,
    }
}

#[tokio::test]
async fn chat_mode_streams_and_persists_reply() {
    let h = harness(
        MockLlm::with_scripts(vec![Script::Deltas(vec!["Hel", "lo"])]),
        MockKnowledge::new(Vec::new()),
    );
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();

    let deltas: Vec<String> = h
        .service
        .send_message_stream(&chat_id, "hi there")
        .map(|d| d.unwrap())
        .collect()
        .await;
    assert_eq!(deltas, vec!["Hel", "lo"]);

    let chat = h.service.chat(&chat_id).await.unwrap();
    assert_eq!(chat.title, "hi there");
    assert_eq!(chat.messages.len(), 2);
    let (question, reply) = (&chat.messages[0], &chat.messages[1]);
    assert_eq!(question.role, Role::User);
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Hello");
    assert_eq!(reply.parent_id.as_deref(), Some(question.id.as_str()));

    let turns = h.llm.last_turns();
    assert_eq!(turns.first().map(|t| t.role), Some(Role::System));
    assert_eq!(turns.last().map(|t| t.content.as_str()), Some("hi there"));
    assert_eq!(turns.len(), 2);

    let stored = h
        .store
        .get(CHATS_COLLECTION, &format!("u1:{chat_id}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["chat"]["messages"][1]["content"], "Hello");
}

#[tokio::test]
async fn rag_mode_builds_context_and_attaches_sources() {
    let h = harness(
        MockLlm::with_scripts(vec![Script::Deltas(vec!["Per [2], yes."])]),
        MockKnowledge::new(vec![
            chunk("d1", "Guide", "low relevance", 0.2),
            chunk("d1", "Guide", "high relevance", 0.9),
        ]),
    );
    let chat_id = h.service.create_chat(ChatMode::Rag, None).await.unwrap();
    h.service
        .set_chat_documents(&chat_id, vec!["d1".to_string()])
        .await
        .unwrap();

    let reply = h.service.send_message(&chat_id, "what?").await.unwrap();
    assert_eq!(reply.content, "Per [2], yes.");
    assert_eq!(reply.sources.len(), 2);
    assert!(reply.sources[0].score > reply.sources[1].score);
    assert_eq!(reply.sources[0].label, "Guide, p. 1");

    let query = h.knowledge.queries.lock().unwrap()[0].clone();
    assert_eq!(query.query, "what?");
    assert_eq!(query.document_ids, vec!["d1"]);
    assert_eq!(query.top_k, 5);

    let prompt = h.llm.last_turns().last().unwrap().content.clone();
    assert!(prompt.contains("[1] Guide, p. 1\nhigh relevance"));
    assert!(prompt.ends_with("Question: what?"));
}

#[tokio::test]
async fn search_mode_answers_without_the_model() {
    let h = harness(
        MockLlm::new(),
        MockKnowledge::new(vec![chunk("d1", "Guide", "alpha", 0.7)]),
    );
    let chat_id = h.service.create_chat(ChatMode::Search, None).await.unwrap();
    let reply = h.service.send_message(&chat_id, "alpha").await.unwrap();
    assert!(reply.content.starts_with("Found 1 passage:"));
    assert!(reply.content.contains("> alpha"));
    assert_eq!(h.llm.stream_calls(), 0);
}

#[tokio::test]
async fn summarize_mode_uses_documents_or_typed_text() {
    let h = harness(MockLlm::new(), MockKnowledge::new(Vec::new()));
    let chat_id = h.service.create_chat(ChatMode::Summarize, None).await.unwrap();

    let reply = h.service.send_message(&chat_id, "a long memo").await.unwrap();
    assert_eq!(reply.content, "short summary");

    h.service
        .set_chat_documents(&chat_id, vec!["d7".to_string()])
        .await
        .unwrap();
    h.service.send_message(&chat_id, "focus on costs").await.unwrap();

    let requests = h.knowledge.summaries.lock().unwrap().clone();
    assert_eq!(requests[0].text.as_deref(), Some("a long memo"));
    assert!(requests[0].document_ids.is_empty());
    assert_eq!(requests[1].document_ids, vec!["d7"]);
    assert_eq!(requests[1].instructions.as_deref(), Some("focus on costs"));
    assert!(requests[1].text.is_none());
}

#[tokio::test]
async fn failed_request_removes_placeholder_and_notifies() {
    let h = harness(MockLlm::new(), MockKnowledge::failing());
    let mut events = h.notifier.subscribe();
    let chat_id = h.service.create_chat(ChatMode::Rag, None).await.unwrap();

    let err = h.service.send_message(&chat_id, "question").await.unwrap_err();
    assert!(matches!(err, RagDeskError::Http(_)));

    let chat = h.service.chat(&chat_id).await.unwrap();
    assert_eq!(chat.messages.len(), 1);
    assert_eq!(chat.messages[0].role, Role::User);

    let event = events.recv().await.unwrap();
    assert_eq!(event.level, NoticeLevel::Error);
    assert!(event.message.contains("rag request failed"));
}

#[tokio::test]
async fn interrupted_stream_keeps_partial_reply() {
    let h = harness(
        MockLlm::with_scripts(vec![Script::FailAfter(vec!["par", "tial"])]),
        MockKnowledge::new(Vec::new()),
    );
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();

    let items: Vec<_> = h.service.send_message_stream(&chat_id, "go").collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[2].is_err());

    let chat = h.service.chat(&chat_id).await.unwrap();
    assert_eq!(chat.messages[1].content, "partial");
}

#[tokio::test]
async fn abandoned_stream_saves_what_arrived() {
    let h = harness(
        MockLlm::with_scripts(vec![Script::Deltas(vec!["par", "tial"])]),
        MockKnowledge::new(Vec::new()),
    );
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();

    let mut stream = h.service.send_message_stream(&chat_id, "go");
    assert_eq!(stream.next().await.unwrap().unwrap(), "par");
    drop(stream);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let stored = h
        .store
        .get(CHATS_COLLECTION, &format!("u1:{chat_id}"))
        .await
        .unwrap()
        .unwrap();
    let messages = stored["chat"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["content"], "par");
}

#[tokio::test]
async fn regenerate_replaces_last_reply() {
    let h = harness(
        MockLlm::with_scripts(vec![
            Script::Deltas(vec!["first"]),
            Script::Deltas(vec!["second"]),
        ]),
        MockKnowledge::new(Vec::new()),
    );
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();
    h.service.send_message(&chat_id, "question").await.unwrap();

    let reply = h.service.regenerate_last(&chat_id).await.unwrap();
    assert_eq!(reply.content, "second");

    let chat = h.service.chat(&chat_id).await.unwrap();
    let replies: Vec<_> = chat
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].content, "second");
    assert_eq!(
        h.llm.last_turns().last().map(|t| t.content.as_str()),
        Some("question")
    );
}

#[tokio::test]
async fn rejects_blank_messages_and_unknown_chats() {
    let h = harness(MockLlm::new(), MockKnowledge::new(Vec::new()));
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();
    assert!(matches!(
        h.service.send_message(&chat_id, "   ").await,
        Err(RagDeskError::Validation(_))
    ));
    assert!(matches!(
        h.service.send_message("missing", "hi").await,
        Err(RagDeskError::NotFound(_))
    ));
    assert!(h.service.chat(&chat_id).await.unwrap().messages.is_empty());
}

#[tokio::test]
async fn history_is_replayed_in_order() {
    let h = harness(
        MockLlm::with_scripts(vec![
            Script::Deltas(vec!["one"]),
            Script::Deltas(vec!["two"]),
        ]),
        MockKnowledge::new(Vec::new()),
    );
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();
    h.service.send_message(&chat_id, "first").await.unwrap();
    h.service.send_message(&chat_id, "second").await.unwrap();

    let contents: Vec<String> = h
        .llm
        .last_turns()
        .into_iter()
        .skip(1)
        .map(|t| t.content)
        .collect();
    assert_eq!(contents, vec!["first", "one", "second"]);
}

#[tokio::test]
async fn reactions_and_deletion_are_persisted() {
    let h = harness(MockLlm::new(), MockKnowledge::new(Vec::new()));
    let chat_id = h.service.create_chat(ChatMode::Chat, None).await.unwrap();
    let reply = h.service.send_message(&chat_id, "hello").await.unwrap();

    assert!(h
        .service
        .toggle_reaction(&chat_id, &reply.id, Reaction::Star)
        .await
        .unwrap());
    let doc_id = format!("u1:{chat_id}");
    let stored = h.store.get(CHATS_COLLECTION, &doc_id).await.unwrap().unwrap();
    assert_eq!(stored["chat"]["messages"][1]["reactions"][0], "star");

    h.service.delete_chat(&chat_id).await.unwrap();
    assert!(h.store.get(CHATS_COLLECTION, &doc_id).await.unwrap().is_none());
    assert!(h.service.active_chat().await.is_none());
}
