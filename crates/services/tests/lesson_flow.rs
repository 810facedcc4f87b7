use std::sync::Arc;

use client::repository::{
    CompletionSink, InMemoryProgressStore, ProgressRecord, ProgressRepository, RecordingCompletions,
    ResponseGrader, ScriptedGrader,
};
use lesson_core::model::{
    AcceptedResponses, AnswerValue, CefrLevel, ContentStep, FreeResponseStep, LearnerProfile,
    Lesson, LessonId, MultipleChoiceStep, Step, StepId,
};
use lesson_core::time::fixed_clock;
use services::{AdvanceOutcome, LessonSessionService, SubmitOutcome};

fn lesson() -> Arc<Lesson> {
    Arc::new(
        Lesson::new(
            LessonId::new("fr-greetings-1"),
            "Greetings",
            "French",
            CefrLevel::A1,
            vec![
                Step::Content(ContentStep {
                    id: StepId::new("intro"),
                    content_markdown: Some("Bienvenue !".into()),
                    image_url: None,
                }),
                Step::MultipleChoice(MultipleChoiceStep {
                    id: StepId::new("mc-1"),
                    question: "How do you greet someone in French?".into(),
                    options: vec!["Hola".into(), "Bonjour".into(), "Ciao".into()],
                    correct_index: Some(1),
                    correct_answer: None,
                    feedback: None,
                }),
                Step::FreeResponse(FreeResponseStep {
                    id: StepId::new("fr-1"),
                    question: "What is the capital of France?".into(),
                    hint: None,
                    accepted_responses: Some(AcceptedResponses::Many(vec!["paris".into()])),
                    answer_key: None,
                    ai_grading: false,
                }),
            ],
        )
        .unwrap(),
    )
}

fn ai_lesson() -> Arc<Lesson> {
    Arc::new(
        Lesson::new(
            LessonId::new("fr-intro-1"),
            "Introductions",
            "French",
            CefrLevel::A2,
            vec![Step::FreeResponse(FreeResponseStep {
                id: StepId::new("fr-ai"),
                question: "Introduce yourself.".into(),
                hint: None,
                accepted_responses: None,
                answer_key: None,
                ai_grading: true,
            })],
        )
        .unwrap(),
    )
}

fn profile() -> LearnerProfile {
    LearnerProfile::new("French", CefrLevel::A1)
}

struct Collaborators {
    progress: InMemoryProgressStore,
    grader: ScriptedGrader,
    completions: RecordingCompletions,
}

impl Collaborators {
    fn new(grader: ScriptedGrader) -> Self {
        Self {
            progress: InMemoryProgressStore::new(),
            grader,
            completions: RecordingCompletions::new(),
        }
    }

    async fn open(&self, lesson: Arc<Lesson>) -> LessonSessionService {
        LessonSessionService::open(
            lesson,
            profile(),
            fixed_clock(),
            Arc::new(self.progress.clone()) as Arc<dyn ProgressRepository>,
            Arc::new(self.grader.clone()) as Arc<dyn ResponseGrader>,
            Arc::new(self.completions.clone()) as Arc<dyn CompletionSink>,
        )
        .await
    }

    fn open_review(&self, lesson: Arc<Lesson>) -> LessonSessionService {
        LessonSessionService::open_review(
            lesson,
            profile(),
            fixed_clock(),
            Arc::new(self.progress.clone()) as Arc<dyn ProgressRepository>,
            Arc::new(self.grader.clone()) as Arc<dyn ResponseGrader>,
            Arc::new(self.completions.clone()) as Arc<dyn CompletionSink>,
        )
    }
}

#[tokio::test]
async fn full_lesson_flow_completes_and_reports() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open(lesson()).await;

    // content step: nothing to answer
    assert!(svc.session().can_press_next());
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Moved { index: 1 });

    // multiple choice, graded immediately
    let mc = StepId::new("mc-1");
    assert_eq!(svc.submit_choice(&mc, 1).unwrap(), SubmitOutcome::Graded);
    assert!(svc.session().feedback_for(&mc).unwrap().is_correct);
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Moved { index: 2 });

    // free response against the accepted list, case-folded
    let fr = StepId::new("fr-1");
    assert_eq!(
        svc.submit_free_response(&fr, "Paris").await.unwrap(),
        SubmitOutcome::Graded
    );
    assert!(svc.session().feedback_for(&fr).unwrap().is_correct);
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Completed);

    // progress persisted after each cursor move
    let record = collab.progress.get(&LessonId::new("fr-greetings-1")).unwrap();
    assert_eq!(record.current_step, 2);
    assert_eq!(record.completed_steps, vec![0, 1, 2]);

    // aggregated completion emitted exactly once
    let completed = collab.completions.completed();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].answers.get(&mc), Some(&AnswerValue::Choice(1)));
    assert_eq!(
        completed[0].answers.get(&fr),
        Some(&AnswerValue::Text("Paris".into()))
    );
    assert_eq!(completed[0].total_score, Some(100));
}

#[tokio::test]
async fn review_session_never_touches_the_progress_store() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open_review(lesson());

    let session = svc.session();
    assert!(session.review_mode());
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.completed_steps().len(), 3);
    assert!(session.feedback_for(&StepId::new("mc-1")).unwrap().is_correct);
    assert!(session.feedback_for(&StepId::new("fr-1")).unwrap().is_correct);

    // walking the whole lesson in review issues no reads and no writes
    svc.advance().await.unwrap();
    svc.advance().await.unwrap();
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Completed);
    assert_eq!(collab.progress.load_count(), 0);
    assert_eq!(collab.progress.save_count(), 0);
    // finishing a replay does not re-report completion
    assert!(collab.completions.completed().is_empty());
}

#[tokio::test]
async fn ai_grading_scores_through_the_collaborator() {
    let collab = Collaborators::new(ScriptedGrader::scoring(88.0, "Natural phrasing."));
    let mut svc = collab.open(ai_lesson()).await;

    let id = StepId::new("fr-ai");
    assert_eq!(
        svc.submit_free_response(&id, "Je m'appelle Nour.").await.unwrap(),
        SubmitOutcome::Graded
    );
    let feedback = svc.session().feedback_for(&id).unwrap();
    assert!(feedback.is_correct);
    assert_eq!(feedback.score, Some(88));
    assert_eq!(feedback.message, "Natural phrasing.");

    // the request carried the learner and lesson context
    let requests = collab.grader.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].language, "French");
    assert_eq!(requests[0].lesson_context.lesson_id, LessonId::new("fr-intro-1"));
    assert_eq!(requests[0].lesson_context.title, "Introductions");
}

#[tokio::test]
async fn ai_grading_outage_fails_open() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open(ai_lesson()).await;

    let id = StepId::new("fr-ai");
    assert_eq!(
        svc.submit_free_response(&id, "Bonjour, je suis là.").await.unwrap(),
        SubmitOutcome::Graded
    );
    let feedback = svc.session().feedback_for(&id).unwrap();
    assert!(feedback.is_correct);
    assert_eq!(feedback.score, None);
    assert!(!svc.session().is_pending(&id));

    // the outage never blocks finishing the lesson
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Completed);
}

#[tokio::test]
async fn persisted_progress_is_restored_on_open() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    collab
        .progress
        .save(&ProgressRecord {
            lesson_id: LessonId::new("fr-greetings-1"),
            current_step: 2,
            completed_steps: vec![0, 1],
        })
        .await
        .unwrap();

    let svc = collab.open(lesson()).await;
    assert_eq!(svc.session().current_index(), 2);
    assert_eq!(svc.session().completed_steps().len(), 2);
}

#[tokio::test]
async fn reset_clears_the_store_and_restarts() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open(lesson()).await;

    svc.advance().await.unwrap();
    assert!(collab.progress.get(&LessonId::new("fr-greetings-1")).is_some());

    svc.reset().await;
    assert!(collab.progress.get(&LessonId::new("fr-greetings-1")).is_none());
    assert_eq!(svc.session().current_index(), 0);
    assert!(svc.session().completed_steps().is_empty());
    assert!(!svc.session().review_mode());
}

#[tokio::test]
async fn advance_is_blocked_until_free_response_has_content() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open(lesson()).await;

    svc.advance().await.unwrap();
    svc.submit_choice(&StepId::new("mc-1"), 1).unwrap();
    svc.advance().await.unwrap();

    // nothing submitted yet: blocked, and the block persists nothing new
    let saves_before = collab.progress.save_count();
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Blocked);
    assert_eq!(collab.progress.save_count(), saves_before);

    assert_eq!(
        svc.submit_free_response(&StepId::new("fr-1"), "  ").await.unwrap(),
        SubmitOutcome::Empty
    );
    assert_eq!(svc.advance().await.unwrap(), AdvanceOutcome::Blocked);
}

#[tokio::test]
async fn navigation_persists_only_real_moves() {
    let collab = Collaborators::new(ScriptedGrader::failing());
    let mut svc = collab.open(lesson()).await;

    svc.advance().await.unwrap();
    let saves = collab.progress.save_count();

    // staying put is allowed but not a change
    assert!(svc.navigate_to(1).await);
    assert_eq!(collab.progress.save_count(), saves);

    // jumping ahead into unfinished territory is denied
    assert!(!svc.navigate_to(2).await);
    assert_eq!(collab.progress.save_count(), saves);

    assert!(svc.retreat().await);
    assert_eq!(collab.progress.save_count(), saves + 1);
}
