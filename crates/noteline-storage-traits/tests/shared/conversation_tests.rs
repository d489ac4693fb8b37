//! Conversation storage test functions

use noteline_storage_traits::conversations::ConversationStorage;
use noteline_storage_traits::conversations::types::Conversation;

/// Save and look up conversations by id and participant
pub fn test_save_and_find_conversation<S>(storage: S)
where
    S: ConversationStorage,
{
    let mut owner = Conversation::owner("conv-1", "ADDR-1");
    owner.created_at = 100;
    storage.save_conversation(owner.clone()).unwrap();

    let found = storage.find_conversation("conv-1").unwrap().unwrap();
    assert_eq!(found, owner);

    let mut agent = Conversation::owner("conv-2", "ADDR-1")
        .with_agent("agent-7")
        .with_session("session-3");
    agent.created_at = 200;
    storage.save_conversation(agent.clone()).unwrap();

    // The newest conversation wins for a participant
    let found = storage
        .find_conversation_by_participant("ADDR-1")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "conv-2");
    assert_eq!(found.agent_id.as_deref(), Some("agent-7"));
    assert_eq!(found.session_id.as_deref(), Some("session-3"));

    assert!(
        storage
            .find_conversation_by_participant("ADDR-404")
            .unwrap()
            .is_none()
    );
}
