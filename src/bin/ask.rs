use ai_teacher::adapters::teacher_client::DEFAULT_BACKEND_URL;
use ai_teacher::app::board;
use ai_teacher::utils::logger;
use ai_teacher::{Classroom, Level, TeacherClient};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Ask the All-Rounder AI Teacher a question from the terminal")]
struct Args {
    /// The question to ask (or the phrase to translate with --translate)
    question: Option<String>,

    /// Backend base URL
    #[arg(long, env = "AI_TEACHER_URL", default_value = DEFAULT_BACKEND_URL)]
    server_url: String,

    #[arg(short, long, default_value = "Mathematics")]
    subject: String,

    #[arg(short, long, default_value = "intermediate")]
    level: Level,

    #[arg(short, long, default_value = "Nanami")]
    teacher: String,

    /// Translate the question into Japanese using `formal` or `casual` speech
    #[arg(long, value_name = "SPEECH")]
    translate: Option<String>,

    /// Only check whether the backend is up
    #[arg(long)]
    health: bool,

    /// Print the raw lesson JSON instead of the board
    #[arg(long)]
    json: bool,

    #[arg(long)]
    no_steps: bool,

    #[arg(long)]
    no_examples: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let client = TeacherClient::new(&args.server_url)?;

    if args.health {
        match client.health().await {
            Ok(health) => {
                println!("✅ {} ({})", health.message, health.timestamp);
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ {}: {}", e, client.base_url());
                std::process::exit(1);
            }
        }
    }

    let Some(question) = args.question.as_deref().filter(|q| !q.trim().is_empty()) else {
        eprintln!("❌ Please provide a question");
        std::process::exit(2);
    };

    // 翻譯模式直接呼叫舊版日文輔助端點
    if let Some(speech) = &args.translate {
        match client.translation(question, speech).await {
            Ok(lesson) => {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&lesson)?);
                } else {
                    println!("{}", lesson.spoken_text());
                    print!("{}", board::render(&lesson, !args.no_steps, !args.no_examples));
                }
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut classroom = Classroom::new();
    classroom.set_teacher(&args.teacher)?;
    classroom.set_subject(&args.subject)?;
    classroom.set_level(args.level);
    classroom.show_steps = !args.no_steps;
    classroom.show_examples = !args.no_examples;

    tracing::info!(
        "{} is answering ({}, {})",
        classroom.teacher,
        classroom.subject,
        classroom.level
    );

    let Some(message) = classroom.ask(&client, question).await.cloned() else {
        let error = classroom.error.as_deref().unwrap_or("No answer received");
        eprintln!("❌ {}", error);
        std::process::exit(1);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message.answer)?);
        return Ok(());
    }

    let lesson = &message.answer;
    if !lesson.topic.is_empty() {
        println!("📚 {}", lesson.topic);
    }
    println!("👩‍🏫 {}: {}", classroom.teacher, lesson.spoken_text());
    println!();
    print!(
        "{}",
        board::render(lesson, classroom.show_steps, classroom.show_examples)
    );

    if !lesson.next_topics.is_empty() {
        println!();
        println!("➡️  Next: {}", lesson.next_topics.join(", "));
    }

    Ok(())
}
