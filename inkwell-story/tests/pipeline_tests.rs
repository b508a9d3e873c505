//! End to end: completion events drive comic and analysis; sweeps recover
//! whatever the event path missed

mod helpers;

use helpers::{TestEnv, MOCK_IMAGE};
use inkwell_common::events::{InkwellEvent, STORY_COMPLETED};
use inkwell_story::db::{comics, stories};
use inkwell_story::services::SweepReport;
use std::sync::atomic::Ordering;

const FIVE: [&str; 5] = [
    "Mira found a map.",
    "The map led to a cave.",
    "Inside the cave slept a dragon.",
    "Mira tiptoed past the dragon.",
    "She found the treasure and ran home.",
];

#[tokio::test]
async fn test_completion_event_produces_comic_and_analysis() {
    let env = TestEnv::new().await;
    let mut watcher = env.bus.watch();

    let story = env.pipeline.stories.create_story(1, "Test").await.unwrap();
    for text in FIVE {
        env.pipeline.stories.add_sentence(story.id, text).await.unwrap();
    }
    env.pipeline.stories.complete_story(story.id).await.unwrap();

    env.bus.drain().await;

    let first = watcher.recv().await.unwrap();
    assert_eq!(first.topic(), STORY_COMPLETED);
    assert_eq!(first.story_id(), story.id);

    let comic = comics::comic_for_story(&env.db, story.id).await.unwrap().unwrap();
    assert_eq!(comic.title, "Test");
    assert_eq!(comic.thumbnail.as_deref(), Some(MOCK_IMAGE));
    assert!(env.comic_path(story.id).exists());
    assert_eq!(env.renderer.last_panel_count.load(Ordering::SeqCst), 5);
    assert_eq!(env.renderer.last_images.load(Ordering::SeqCst), 5);

    let stored = stories::get_story(&env.db, story.id).await.unwrap().unwrap();
    assert!(stored.is_completed());
    assert!(stored.analysis.is_some());
    assert!(!stored.tips.unwrap_or_default().is_empty());

    // Nothing left for the sweeps
    let (comic_report, analysis_report) = env.pipeline.sweeps.run_all().await;
    assert_eq!(comic_report.unwrap(), SweepReport::default());
    assert_eq!(analysis_report.unwrap(), SweepReport::default());
}

#[tokio::test]
async fn test_dropped_delivery_recovered_by_sweep() {
    let env = TestEnv::without_subscribers().await;

    let story = env.pipeline.stories.create_story(1, "Test").await.unwrap();
    for text in FIVE {
        env.pipeline.stories.add_sentence(story.id, text).await.unwrap();
    }
    env.pipeline.stories.complete_story(story.id).await.unwrap();
    env.bus.drain().await;

    assert!(comics::comic_for_story(&env.db, story.id).await.unwrap().is_none());
    assert!(stories::get_story(&env.db, story.id)
        .await
        .unwrap()
        .unwrap()
        .analysis
        .is_none());

    let comic_report = env.pipeline.sweeps.sweep_missing_comics().await.unwrap();
    let analysis_report = env.pipeline.sweeps.sweep_missing_analyses().await.unwrap();

    assert_eq!(comic_report.scanned, 1);
    assert_eq!(comic_report.produced, 1);
    assert_eq!(analysis_report.produced, 1);

    let comic = comics::comic_for_story(&env.db, story.id).await.unwrap().unwrap();
    assert_eq!(comic.thumbnail.as_deref(), Some(MOCK_IMAGE));
    assert_eq!(env.renderer.last_panel_count.load(Ordering::SeqCst), 5);
    let stored = stories::get_story(&env.db, story.id).await.unwrap().unwrap();
    assert!(!stored.tips.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_sweep_completeness_with_per_story_failure() {
    let env = TestEnv::without_subscribers().await;
    env.critic.fail_on("poison");

    let mut ids = Vec::new();
    for (i, marker) in ["alpha", "poison", "gamma"].iter().enumerate() {
        let id = env
            .completed_story(i as i64 + 1, marker, &[&format!("The {} story.", marker)])
            .await;
        ids.push(id);
    }
    // A draft is never swept
    let draft = env.pipeline.stories.create_story(9, "draft").await.unwrap();

    let (comic_report, analysis_report) = env.pipeline.sweeps.run_all().await;
    let comic_report = comic_report.unwrap();
    let analysis_report = analysis_report.unwrap();

    assert_eq!(
        comic_report,
        SweepReport {
            scanned: 3,
            produced: 3,
            skipped: 0,
            failed: 0
        }
    );
    assert_eq!(analysis_report.scanned, 3);
    assert_eq!(analysis_report.produced, 2);
    assert_eq!(analysis_report.failed, 1);

    for id in &ids {
        assert!(comics::comic_for_story(&env.db, *id).await.unwrap().is_some());
    }
    assert!(comics::comic_for_story(&env.db, draft.id).await.unwrap().is_none());

    let pending: Vec<i64> = stories::stories_missing_analysis(&env.db)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(pending, vec![ids[1]]);

    // Next pass picks up the failed story once the critic recovers
    *env.critic.fail_marker.lock().unwrap() = None;
    let retry = env.pipeline.sweeps.sweep_missing_analyses().await.unwrap();
    assert_eq!(retry.produced, 1);
    assert!(stories::stories_missing_analysis(&env.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_complete_twice_publishes_once() {
    let env = TestEnv::new().await;
    let mut watcher = env.bus.watch();
    let story = env.pipeline.stories.create_story(1, "Twice").await.unwrap();
    env.pipeline.stories.add_sentence(story.id, "Hello.").await.unwrap();

    env.pipeline.stories.complete_story(story.id).await.unwrap();
    let again = env.pipeline.stories.complete_story(story.id).await.unwrap();
    assert!(again.is_completed());
    env.bus.drain().await;

    assert_eq!(env.critic.call_count(), 1);
    assert_eq!(comics::count_for_story(&env.db, story.id).await.unwrap(), 1);

    let mut completions = 0;
    while let Ok(event) = watcher.try_recv() {
        if matches!(event, InkwellEvent::StoryCompleted { .. }) {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_failed_handler_does_not_affect_sibling() {
    let env = TestEnv::new().await;
    env.renderer.fail.store(true, Ordering::SeqCst);

    let story_id = env.completed_story(1, "Half", &["One half."]).await;
    env.bus.drain().await;

    assert!(comics::comic_for_story(&env.db, story_id).await.unwrap().is_none());
    let stored = stories::get_story(&env.db, story_id).await.unwrap().unwrap();
    assert!(stored.analysis.is_some());

    env.renderer.fail.store(false, Ordering::SeqCst);
    let report = env.pipeline.sweeps.sweep_missing_comics().await.unwrap();
    assert_eq!(report.produced, 1);
}

#[tokio::test]
async fn test_story_progress_hint() {
    let env = TestEnv::new().await;
    let story = env.pipeline.stories.create_story(3, "Current").await.unwrap();
    env.pipeline.stories.add_sentence(story.id, "One.").await.unwrap();
    env.pipeline.stories.add_sentence(story.id, "Two.").await.unwrap();

    let progress = env.pipeline.stories.story_progress(3).await.unwrap();
    assert_eq!(progress.story.map(|s| s.id), Some(story.id));
    assert_eq!(progress.sentence_count, 2);
    assert_eq!(progress.max_sentences, 5);

    let nobody = env.pipeline.stories.story_progress(99).await.unwrap();
    assert!(nobody.story.is_none());
    assert_eq!(nobody.sentence_count, 0);
}
