use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use study_planner::{
    respond, ChatError, FragmentStream, InferenceClient, InferenceRequest, Outcome, Rejection,
    Role, Session, Turn,
};

/// Replays fixed fragments and remembers every request it receives.
struct ScriptedClient {
    fragments: Vec<&'static str>,
    fail_at_start: bool,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedClient {
    fn new(fragments: Vec<&'static str>) -> Self {
        Self {
            fragments,
            fail_at_start: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_at_start: true,
            ..Self::new(Vec::new())
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn stream(&self, request: &InferenceRequest) -> study_planner::Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_at_start {
            return Err(ChatError::api(503, "service unavailable"));
        }
        let items: Vec<study_planner::Result<String>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        Ok(stream::iter(items).boxed())
    }
}

#[tokio::test]
async fn study_plan_request_gets_an_answer() {
    let client = ScriptedClient::new(vec!["Week 1: ", "algebra. ", "Week 2: geometry."]);
    let mut session = Session::default();
    let mut rendered = String::new();

    let outcome = respond(&mut session, &client, "I need a study plan for my exams", |f| {
        rendered.push_str(f)
    })
    .await
    .unwrap();

    let answer = "Week 1: algebra. Week 2: geometry.";
    assert_eq!(outcome, Outcome::Answered(answer.to_string()));
    assert_eq!(rendered, answer);
    assert_eq!(client.calls(), 1);

    let turns = session.conversation().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1], Turn::user("I need a study plan for my exams"));
    assert_eq!(turns[2], Turn::assistant(answer));
}

#[tokio::test]
async fn excessive_study_time_gets_safety_refusal() {
    let client = ScriptedClient::new(vec!["should not be used"]);
    let mut session = Session::default();

    let outcome = respond(&mut session, &client, "I want to study for 20 hours a day", |_| {})
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Rejected(Rejection::TimeLimitExceeded));
    assert_eq!(client.calls(), 0);
    assert!(session
        .conversation()
        .turns()
        .iter()
        .skip(1)
        .all(|t| t.role == Role::User));
}

#[tokio::test]
async fn off_topic_message_gets_refusal() {
    let client = ScriptedClient::new(vec!["should not be used"]);
    let mut session = Session::default();

    let outcome = respond(&mut session, &client, "Tell me a joke", |_| {})
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Rejected(Rejection::OffTopic));
    assert_eq!(client.calls(), 0);
    assert_eq!(session.conversation().last().role, Role::User);
}

#[tokio::test]
async fn history_is_carried_into_the_next_prompt() {
    let client = ScriptedClient::new(vec!["Sure."]);
    let mut session = Session::default();

    respond(&mut session, &client, "make a revision timetable", |_| {})
        .await
        .unwrap();
    respond(&mut session, &client, "add homework slots", |_| {})
        .await
        .unwrap();

    let requests = client.requests.lock().unwrap();
    let second = &requests[1].input.prompt;
    let first_question = second.find("User: make a revision timetable").unwrap();
    let first_answer = second.find("Assistant: Sure.").unwrap();
    let follow_up = second.find("User: add homework slots").unwrap();
    assert!(first_question < first_answer && first_answer < follow_up);
    assert!(second.ends_with(" add homework slots Assistant: "));
}

#[tokio::test]
async fn inference_failure_leaves_conversation_consistent() {
    let client = ScriptedClient::failing();
    let mut session = Session::default();

    let result = respond(&mut session, &client, "homework help please", |_| {}).await;

    assert!(matches!(result, Err(ChatError::Api { status: 503, .. })));
    assert_eq!(session.conversation().len(), 1);
}

#[tokio::test]
async fn clearing_always_leaves_only_the_greeting() {
    let client = ScriptedClient::new(vec!["Plan."]);
    let mut session = Session::default();

    for text in ["study plan", "Tell me a joke", "study for 30 hours"] {
        let _ = respond(&mut session, &client, text, |_| {}).await;
    }
    assert!(session.conversation().len() > 1);

    session.clear();

    assert_eq!(session.conversation().len(), 1);
    assert_eq!(
        session.conversation().turns()[0],
        Turn::assistant("How may I assist you today?")
    );
}
