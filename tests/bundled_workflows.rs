//! Bundled variants driven end to end against the scripted page probe

use action_flow::{BatchCoordinator, RunOutcome, WizardRunner};
use action_primitives::testing::FakeProbe;
use action_primitives::{Locator, UiAction};
use wizardflow_cli::{read_records, workflows, Config};

const VENDORS: &str = "\
VendorName,TRN,VendorTag
Alpha,100200300.0,Electrical
Beta,,Civil
";

#[tokio::test(start_paused = true)]
async fn every_bundled_variant_completes_on_a_responsive_surface() {
    let config = Config::default();
    for workflow in workflows::bundled().unwrap() {
        let records = read_records(VENDORS.as_bytes(), &workflow.record).unwrap();
        let probe = FakeProbe::new();
        let coordinator = BatchCoordinator::new(WizardRunner::new(config.runner_config()));

        let report = coordinator
            .run_all(records, &workflow, &probe)
            .await
            .unwrap()
            .collect()
            .await;

        assert!(
            report.summary.all_succeeded(),
            "{} did not complete: {:?}",
            workflow.name,
            report.records
        );
        assert_eq!(report.records.len(), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn record_values_reach_the_surface() {
    let workflow = workflows::resolve("rdash-full").unwrap();
    let records = read_records(VENDORS.as_bytes(), &workflow.record).unwrap();
    let probe = FakeProbe::new();
    let coordinator = BatchCoordinator::new(WizardRunner::new(Config::default().runner_config()));

    let report = coordinator
        .run_all(records, &workflow, &probe)
        .await
        .unwrap()
        .collect()
        .await;
    assert!(report.records.iter().all(|r| r.outcome == RunOutcome::Success));

    let actions = probe.actions();
    assert!(actions.contains(&UiAction::Click(Locator::Xpath(
        "//span[@title='Electrical']".to_string()
    ))));
    assert!(actions.contains(&UiAction::Type {
        target: Locator::Name("TRN".to_string()),
        text: "100200300".to_string(),
    }));
    assert!(actions
        .iter()
        .any(|a| matches!(a, UiAction::Type { text, .. } if text == "Beta")));
}
