use crate::infra::{InMemoryBlobStore, InMemoryRecordStore};
use async_trait::async_trait;
use clap::Args;
use job_board::error::AppError;
use job_board::workflows::hiring::notifications::{
    InMemoryQueue, NotificationMessage, NotificationWorker, Notifier, NotifyError, WorkerConfig,
};
use job_board::workflows::hiring::{ApplicationSubmission, JobBoardService, JobPosting};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Candidate name used for the sample application
    #[arg(long, default_value = "Ada Lovelace")]
    candidate_name: String,
    /// Candidate email used for the sample application
    #[arg(long, default_value = "ada@example.com")]
    candidate_email: String,
    /// File name for the sample résumé (.pdf, .docx or .txt)
    #[arg(long, default_value = "resume.txt")]
    resume_name: String,
}

/// Prints each notification summary to stdout.
struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        println!("  Notification {}:", message.message_id);
        for line in message.summary().lines() {
            println!("    {line}");
        }
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        candidate_name,
        candidate_email,
        resume_name,
    } = args;

    let queue = Arc::new(InMemoryQueue::default());
    let service = JobBoardService::new(
        Arc::new(InMemoryRecordStore::default()),
        Arc::new(InMemoryBlobStore::default()),
        queue.clone(),
    );

    println!("Job board demo");
    let job = match service
        .post_job(JobPosting {
            title: "Platform Engineer".to_string(),
            description: "Operate the application intake pipeline".to_string(),
            company: "Northwind Traders".to_string(),
            min_salary: 7000,
            max_salary: 11000,
        })
        .await
    {
        Ok(job) => job,
        Err(err) => {
            println!("  Job posting rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  Posted {} at {} (salary {}-{}) as {}",
        job.title, job.company, job.salary.min, job.salary.max, job.id
    );

    let submission = ApplicationSubmission {
        candidate_name,
        candidate_email,
    };
    let application = match service.submit_application(&job.id, submission).await {
        Ok(application) => application,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "  Application {} received from {} <{}>",
        application.id, application.candidate_name, application.candidate_email
    );
    println!("  Notifications waiting: {}", queue.len());

    let resume = format!(
        "{}\n{}\nExperience: queue consumers, HTTP services\n",
        application.candidate_name, application.candidate_email
    );
    match service
        .attach_resume(&application.id, &resume_name, resume.into_bytes())
        .await
    {
        Ok(key) => println!("  Résumé stored under {key}"),
        Err(err) => println!("  Résumé rejected: {err}"),
    }

    println!("\nDraining notifications");
    let worker = NotificationWorker::new(
        WorkerConfig {
            name: "demo-worker".to_string(),
            wait_time: Duration::from_millis(100),
            ..WorkerConfig::default()
        },
        queue.clone(),
        Arc::new(ConsoleNotifier),
    )
    .spawn(CancellationToken::new());

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while !queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok();
    let stats = worker.stop().await?;

    if !drained {
        println!("  Queue still holds {} notification(s)", queue.len());
    }
    println!(
        "  Worker stats: received {}, succeeded {}, failed {}, acknowledged {}",
        stats.received, stats.succeeded, stats.failed, stats.acknowledged
    );
    Ok(())
}
