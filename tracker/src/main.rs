use std::{fs::OpenOptions, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use hike_tracker_data_management::{CompletedHike, DataManager, Difficulty, HikeDetails};
use hike_tracker_lib::{hike_session::{FirstSampleBaseline, HikeStatus}, stats};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker::{
    clock::IntervalClock,
    config::{parse_baseline, TrackerConfig},
    driver::SessionDriver,
    location::GpxReplaySource,
};

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Record hikes and keep track of them", long_about = None)]
struct Cli {
    /// Config file, tracker.conf in the project root by default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Override how the first sample's elevation is counted (zero or reading)
    #[arg(long, global = true, value_parser = parse_baseline)]
    baseline: Option<FirstSampleBaseline>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a hike by replaying a GPX file as live positions.
    /// Type p to pause, r to resume, s to stop, or an empty line for the current stats
    Record {
        gpx_file: PathBuf,
        /// Milliseconds between replayed positions
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
    },
    /// List hikes, newest first
    History,
    /// Show one hike in detail
    Show { hike_id: String },
    /// Totals and personal records
    Records,
    /// Change the details of a saved hike
    Edit {
        hike_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },
    Delete { hike_id: String },
    /// Writes to the gpx folder in the data dir unless a file is given
    ExportGpx { hike_id: String, gpx_file: Option<PathBuf> },
    ImportGpx { gpx_file: PathBuf },
    /// Sign in by email. Give a username to create a new account instead
    Login {
        email: String,
        #[arg(long)]
        username: Option<String>,
    },
    Logout,
    Whoami,
    /// Find users by part of their username
    Users { term: String },
    FriendRequest { username: String },
    /// List incoming friend requests
    Requests,
    Accept { request_id: String },
    Friends,
    /// Share a hike to the feed, optionally with an image
    Share {
        hike_id: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Feed,
    /// Like a post, or unlike it if already liked
    Like { post_id: String },
    Comment { post_id: String, text: String },
    ExportData { file: PathBuf },
    /// Replace all data with an export
    ImportData { file: PathBuf },
    /// Delete all data. BE CAREFUL
    ClearData {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(TrackerConfig::default_path);
    // Paths from the command line stay relative to the working directory
    let mut config = TrackerConfig::load(&config_path)?.resolved();
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(baseline) = cli.baseline {
        config.first_sample_baseline = baseline;
    }

    if let Some(log_dir) = config.log_file.parent() {
        std::fs::create_dir_all(log_dir).with_context(|| format!("Failed to create {:?}", log_dir))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {:?}", config.log_file))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=info,hike_tracker_data_management=info,hike_tracker_lib=warn", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    let data_manager = DataManager::start(&config.database).await?;

    match cli.command {
        Commands::Record { gpx_file, interval_ms, title, description, difficulty } => {
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.sample_interval_ms));
            let hike = record(&data_manager, &config, gpx_file, interval, title, description, difficulty).await?;
            match hike {
                Some(hike) => print_hike(&hike),
                None => println!("Hike discarded"),
            }
        },
        Commands::History => {
            for hike in visible_hikes(&data_manager).await? {
                println!(
                    "{}\t{}\t{:>7.2} km\t{}\t{}",
                    hike.hike_id,
                    hike.record.started_at.format("%d/%m/%Y %H:%M"),
                    hike.record.distance_km,
                    hike.record.duration_formatted,
                    hike.details.title
                );
            }
        },
        Commands::Show { hike_id } => {
            let hike = data_manager.get_hike(&hike_id).await?;
            print_hike(&hike);
            let images = data_manager.images_for_hike(&hike_id).await?;
            if !images.is_empty() {
                println!("Images:        {}", images.len());
            }
        },
        Commands::Records => {
            let hikes = visible_hikes(&data_manager).await?;
            let (records, best) = DataManager::personal_records(&hikes);
            println!("Hikes:              {}", records.total_hikes);
            println!("Total distance:     {:.2} km", records.total_distance_km);
            println!("Total elevation:    {:.1} m", records.total_elevation_gain_m);
            println!("Longest hike:       {:.2} km", records.longest_hike_km);
            println!("Highest elevation:  {:.1} m", records.highest_elevation_m);
            println!("Best avg speed:     {:.2} km/h", records.best_average_speed_kmh);
            println!("Average distance:   {:.2} km", records.average_distance_km);
            if let Some(best) = best {
                println!("Best hike:          {} ({})", best.details.title, best.hike_id);
            }
        },
        Commands::Edit { hike_id, title, description, difficulty } => {
            let current = data_manager.get_hike(&hike_id).await?.details;
            let mut details = HikeDetails::new(
                title.as_deref().unwrap_or(&current.title),
                description.as_deref().unwrap_or(&current.description),
                difficulty.unwrap_or(current.difficulty),
            )?;
            details.image_id = current.image_id;
            let hike = data_manager.update_hike_details(&hike_id, details).await?;
            print_hike(&hike);
        },
        Commands::Delete { hike_id } => {
            data_manager.delete_hike(&hike_id).await?;
            println!("Deleted {hike_id}");
        },
        Commands::ExportGpx { hike_id, gpx_file } => {
            let gpx_file = match gpx_file {
                Some(path) => path,
                None => {
                    let gpx_dir = config.data_dir.join("gpx");
                    std::fs::create_dir_all(&gpx_dir).with_context(|| format!("Failed to create {:?}", gpx_dir))?;
                    gpx_dir.join(format!("{hike_id}.gpx"))
                },
            };
            data_manager.export_gpx(&hike_id, &gpx_file).await?;
            println!("Exported to {:?}", gpx_file);
        },
        Commands::ImportGpx { gpx_file } => {
            let hike = data_manager.import_gpx(&gpx_file, config.first_sample_baseline).await?;
            print_hike(&hike);
        },
        Commands::Login { email, username } => {
            let profile = match username {
                Some(username) => data_manager.create_user(&username, &email).await?,
                None => data_manager.sign_in(&email).await?,
            };
            println!("Logged in as {} ({})", profile.username, profile.uid);
            if !profile.has_seen_tutorial {
                println!("Record a hike with `tracker record <file.gpx>`, then find it again with `tracker history`");
                data_manager.mark_tutorial_seen().await?;
            }
        },
        Commands::Logout => {
            data_manager.sign_out().await?;
            println!("Logged out");
        },
        Commands::Whoami => match data_manager.current_user().await? {
            Some(profile) => {
                println!("{} <{}> ({})", profile.username, profile.email, profile.uid);
                println!("{} hikes, {:.2} km, {:.1} m climbed", profile.total_hikes, profile.total_distance_km, profile.total_elevation_m);
            },
            None => println!("Not logged in"),
        },
        Commands::Users { term } => {
            for profile in data_manager.search_users(&term).await? {
                println!("{}\t{}", profile.uid, profile.username);
            }
        },
        Commands::FriendRequest { username } => {
            let request = data_manager.send_friend_request(&username).await?;
            println!("Sent friend request {}", request.request_id);
        },
        Commands::Requests => {
            for request in data_manager.incoming_friend_requests().await? {
                println!("{}\t{}\t{}", request.request_id, request.from_name, request.created_at.format("%d/%m/%Y"));
            }
        },
        Commands::Accept { request_id } => {
            data_manager.accept_friend_request(&request_id).await?;
            println!("Accepted {request_id}");
        },
        Commands::Friends => {
            for friend in data_manager.friends().await? {
                println!("{}\t{}", friend.uid, friend.username);
            }
        },
        Commands::Share { hike_id, image } => {
            let image = match image {
                Some(path) => Some(std::fs::read(&path).with_context(|| format!("Failed to read image {:?}", path))?),
                None => None,
            };
            let post = data_manager.share_hike(&hike_id, image.as_deref()).await?;
            println!("Shared as {}", post.post_id);
        },
        Commands::Feed => {
            for post in data_manager.feed().await? {
                println!(
                    "{}\t{}\t{}\t{:.2} km\t{} likes",
                    post.post_id,
                    post.username,
                    post.hike.details.title,
                    post.hike.record.distance_km,
                    post.likes.len()
                );
                for comment in &post.comments {
                    println!("\t{}: {}", comment.username, comment.text);
                }
            }
        },
        Commands::Like { post_id } => {
            let liked = data_manager.toggle_like(&post_id).await?;
            println!("{}", if liked { "Liked" } else { "Unliked" });
        },
        Commands::Comment { post_id, text } => {
            data_manager.add_comment(&post_id, &text).await?;
            println!("Commented on {post_id}");
        },
        Commands::ExportData { file } => {
            let export = data_manager.export_all_data().await?;
            std::fs::write(&file, serde_json::to_string_pretty(&export)?).with_context(|| format!("Failed to write {:?}", file))?;
            println!("Exported to {:?}", file);
        },
        Commands::ImportData { file } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let data = serde_json::from_str(&text).with_context(|| format!("{:?} is not valid JSON", file))?;
            data_manager.import_all_data(&data).await?;
            println!("Imported {:?}", file);
        },
        Commands::ClearData { yes } => {
            if !yes {
                bail!("Refusing to delete all data without --yes");
            }
            data_manager.clear_all_data().await?;
            println!("All data deleted");
        },
    }

    Ok(())
}

/// The logged in user's hikes, or every hike when nobody is logged in.
async fn visible_hikes(data_manager: &DataManager) -> anyhow::Result<Vec<CompletedHike>> {
    Ok(match data_manager.current_user().await? {
        Some(profile) => data_manager.get_user_hikes(&profile.uid).await?,
        None => data_manager.get_hikes().await?,
    })
}

async fn record(
    data_manager: &DataManager,
    config: &TrackerConfig,
    gpx_file: PathBuf,
    interval: Duration,
    title: Option<String>,
    description: Option<String>,
    difficulty: Difficulty,
) -> anyhow::Result<Option<CompletedHike>> {
    let source = GpxReplaySource::open(&gpx_file, interval)?;
    let default_title = source.name().map(str::to_string);
    let clock = IntervalClock::default();

    let mut driver = SessionDriver::start(Arc::new(source), Arc::new(clock), config.first_sample_baseline);
    println!("Recording. p = pause, r = resume, s = stop, enter = stats");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status_interval = tokio::time::interval(Duration::from_secs(10));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = driver.next_event() => {
                driver.handle(event);
                for err in driver.take_source_errors() {
                    println!("Location unavailable: {err}");
                }
            },
            line = lines.next_line() => {
                match line?.as_deref().map(str::trim) {
                    Some("p") => {
                        driver.pause()?;
                        println!("Paused");
                    },
                    Some("r") => {
                        driver.resume()?;
                        println!("Resumed");
                    },
                    Some("s") | None => break,
                    Some("") => print_live(&driver),
                    Some(other) => println!("Unknown command {other:?}"),
                }
            },
            _ = &mut ctrl_c => break,
            _ = status_interval.tick() => {
                if driver.status() == HikeStatus::Active {
                    print_live(&driver);
                }
            },
        }
    }

    let record = driver.stop()?;
    if driver.rejected_samples() > 0 {
        tracing::warn!("{} samples were rejected", driver.rejected_samples());
    }

    if record.path.is_empty() {
        println!("No positions were recorded");
        return Ok(None);
    }

    let title = title.or(default_title).unwrap_or_else(|| format!("Hike on {}", record.started_at.format("%d/%m/%Y")));
    let description = description.unwrap_or_else(|| format!("Recorded from {}", gpx_file.display()));
    let details = HikeDetails::new(&title, &description, difficulty)?;

    Ok(Some(data_manager.save_completed_hike(record, details).await?))
}

fn print_live(driver: &SessionDriver) {
    let stats = driver.snapshot();
    println!(
        "[{}] {}  {:.2} km  +{:.0} m  {:.0} m (max {:.0} m)  {:.1} km/h",
        stats.status,
        stats.duration_formatted,
        stats.distance_km,
        stats.elevation_gain_m,
        stats.current_elevation_m,
        stats.max_elevation_m,
        stats.average_speed_kmh
    );
}

fn print_hike(hike: &CompletedHike) {
    let record = &hike.record;
    println!("{} ({})", hike.details.title, hike.hike_id);
    println!("{}", hike.details.description);
    println!("Difficulty:    {}", hike.details.difficulty);
    println!("Started:       {}", record.started_at.to_rfc3339());
    println!("Ended:         {}", record.ended_at.to_rfc3339());
    println!("Distance:      {:.2} km", record.distance_km);
    println!("Duration:      {}", record.duration_formatted);
    println!("Avg speed:     {:.2} km/h", record.average_speed_kmh());
    println!("Pace:          {} min/km", record.formatted_pace());
    println!("Elevation:     +{:.1} m (max {:.1} m)", record.elevation_gain_m, record.max_elevation_m);
    println!("Gain per km:   {:.1} m", stats::round_to(record.elevation_gain_per_km(), 1));
    println!("Points:        {}", record.path.len());
}
