use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cyraquiz::api::{ApiClient, QuizBackend};
use cyraquiz::channel::RoomLink;
use cyraquiz::config::ClientConfig;
use cyraquiz::editor::{validate_for_play, QuizEditor};
use cyraquiz::host::{run_host_game, HostCommand, HostGame, HostOutcome, HostSnapshot, Phase};
use cyraquiz::lobby::HostLobby;
use cyraquiz::player::{join_room, JoinForm, JoinOutcome, PlayerController, PlayerState, JOIN_GRACE};
use cyraquiz::podium::{await_final_results, Standings};
use cyraquiz::session::{avatar_url, SessionStore};
use cyraquiz::types::{Quiz, QuizId};

/// How long the podium waits for the server's final list
const FINAL_RESULTS_WAIT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "cyraquiz", version, about = "Live classroom quizzes from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to host quizzes
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create a host account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Logout,
    /// List your saved quizzes
    Quizzes,
    /// Generate a quiz from a PDF and save it
    Upload { pdf: PathBuf },
    /// Write a new quiz skeleton to a JSON file
    New {
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = 1)]
        questions: usize,
    },
    /// Save a quiz JSON file to your account
    Save {
        file: PathBuf,
        /// Rename the quiz before saving
        #[arg(long)]
        title: Option<String>,
    },
    Delete { id: i64 },
    /// Host a live game for a saved quiz id or a quiz JSON file
    Host { quiz: String },
    /// Join a live game as a player
    Join {
        #[arg(long)]
        pin: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Avatar file name, e.g. nemo.png
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cyraquiz=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let store = SessionStore::new(config.session_file.clone());
    let mut session = store.load().await?;
    let api = ApiClient::new(config.api_url.clone(), config.http_timeout)?;

    match cli.command {
        Command::Login { email, password } => {
            let auth = api.login(email.trim(), &password).await?;
            println!("Bienvenido, {}", auth.email);
            session.login(auth);
            store.save(&mut session).await?;
        }
        Command::Register {
            email,
            password,
            confirm,
        } => {
            api.register(&email, &password, &confirm).await?;
            println!("Cuenta creada. Ahora inicia sesión con `cyraquiz login`.");
        }
        Command::Logout => {
            session.logout();
            store.save(&mut session).await?;
            println!("Sesión cerrada");
        }
        Command::Quizzes => {
            let quizzes = api.list_quizzes(session.token()?).await?;
            println!("Quizzes de {}:", session.display_name());
            if quizzes.is_empty() {
                println!("  (ninguno todavía)");
            }
            for quiz in &quizzes {
                let date = quiz
                    .created_date()
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_default();
                println!(
                    "  [{}] {} ({} preguntas) {}",
                    quiz.id,
                    quiz.title,
                    quiz.questions.len(),
                    date
                );
            }
        }
        Command::Upload { pdf } => {
            let token = session.token()?.to_string();
            let mut quiz = api.generate_from_pdf(&pdf).await?;
            println!(
                "Generadas {} preguntas para '{}'",
                quiz.questions.len(),
                quiz.title
            );
            api.save_quiz(&token, &mut quiz).await?;
            println!("Guardado con id {}", quiz.id);
        }
        Command::New {
            file,
            title,
            questions,
        } => {
            let mut editor = QuizEditor::new(Quiz::new(title));
            for _ in 0..questions {
                editor.add_question();
            }
            write_quiz_file(&file, &editor.into_quiz()).await?;
            println!("Plantilla escrita en {}", file.display());
        }
        Command::Save { file, title } => {
            let token = session.token()?.to_string();
            let mut editor = QuizEditor::new(read_quiz_file(&file).await?);
            if let Some(title) = title {
                editor.set_title(title);
            }
            editor.validate_for_play()?;
            api.save_quiz(&token, editor.quiz_mut()).await?;
            let quiz = editor.into_quiz();
            write_quiz_file(&file, &quiz).await?;
            println!("Guardado '{}' con id {}", quiz.title, quiz.id);
        }
        Command::Delete { id } => {
            api.delete_quiz(session.token()?, id).await?;
            println!("Quiz {} eliminado", id);
        }
        Command::Host { quiz } => {
            let quiz = resolve_quiz(&api, &session, &quiz).await?;
            validate_for_play(&quiz)?;
            host(&config, quiz).await?;
        }
        Command::Join { pin, name, avatar } => {
            let form = JoinForm {
                room_code: pin.unwrap_or_else(|| session.join.room_code.clone()),
                name: name.unwrap_or_else(|| session.join.name.clone()),
                avatar: avatar.unwrap_or_else(|| session.join.avatar_or_default().to_string()),
            };
            session.remember_join(&form.room_code, &form.name, &form.avatar);
            store.save(&mut session).await?;
            play(&config, form).await?;
        }
    }

    Ok(())
}

async fn read_quiz_file(path: &Path) -> Result<Quiz> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

async fn write_quiz_file(path: &Path, quiz: &Quiz) -> Result<()> {
    let json = serde_json::to_vec_pretty(quiz)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// A `.json` path is read locally, anything else is a saved quiz id
async fn resolve_quiz(
    api: &impl QuizBackend,
    session: &cyraquiz::session::SessionContext,
    arg: &str,
) -> Result<Quiz> {
    if arg.ends_with(".json") {
        return read_quiz_file(Path::new(arg)).await;
    }
    let id: i64 = arg
        .parse()
        .with_context(|| format!("'{}' is neither a quiz id nor a .json file", arg))?;
    let quizzes = api.list_quizzes(session.token()?).await?;
    quizzes
        .into_iter()
        .find(|q| q.id == QuizId::Saved(id))
        .with_context(|| format!("No quiz with id {}", id))
}

/// Forward stdin lines until EOF
fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line.trim().to_lowercase()).await.is_err() {
                break;
            }
        }
    });
    rx
}

async fn host(config: &ClientConfig, quiz: Quiz) -> Result<()> {
    let (link, relay) = RoomLink::connect(&config.relay_addr).await?;
    let mut events = link.subscribe();
    let mut input = spawn_stdin_lines();

    let mut lobby = HostLobby::open(Arc::new(quiz), link.clone());
    println!("PIN del juego: {}", lobby.room());
    println!("Escribe 'start' para comenzar o 'quit' para salir.");

    // Lobby
    loop {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { continue };
                if lobby.on_server_event(&event) {
                    let names: Vec<&str> = lobby.roster().iter().map(|p| p.name.as_str()).collect();
                    println!("Jugadores ({}): {}", names.len(), names.join(", "));
                }
            }
            line = input.recv() => match line.as_deref() {
                Some("start") => break,
                Some("quit") | None => {
                    relay.shutdown();
                    return Ok(());
                }
                Some(other) => println!("Comando desconocido: {}", other),
            }
        }
    }

    let (room, quiz, roster) = lobby.start()?;
    let game = HostGame::new(room.clone(), quiz, roster, link.clone())?;
    println!("Comienza el juego. 'next' avanza tras cada revelación, 'cancel' termina.");

    let (status_tx, mut status) = watch::channel(game.snapshot());
    let screen = tokio::spawn(async move {
        let mut shown: Option<HostSnapshot> = None;
        loop {
            let snapshot = status.borrow_and_update().clone();
            render_host(shown.as_ref(), &snapshot);
            shown = Some(snapshot);
            if status.changed().await.is_err() {
                break;
            }
        }
    });

    let (commands_tx, commands) = mpsc::channel(8);
    tokio::spawn(async move {
        while let Some(line) = input.recv().await {
            let command = match line.as_str() {
                "next" | "n" => HostCommand::Advance,
                "cancel" => HostCommand::Cancel,
                _ => continue,
            };
            if commands_tx.send(command).await.is_err() {
                break;
            }
        }
    });

    let outcome = run_host_game(game, link.subscribe(), commands, status_tx).await;
    let _ = screen.await;

    match outcome {
        HostOutcome::Podium(handoff) => {
            match await_final_results(&link, &handoff.room, FINAL_RESULTS_WAIT).await {
                Some(standings) => print_podium(&standings),
                None => println!("No llegaron los resultados finales"),
            }
        }
        HostOutcome::Cancelled => println!("Juego cancelado"),
        HostOutcome::Abandoned => println!("Saliste del juego"),
    }

    relay.shutdown();
    Ok(())
}

fn render_host(previous: Option<&HostSnapshot>, snapshot: &HostSnapshot) {
    let previous_phase = previous.map(|p| p.phase);
    match snapshot.phase {
        Phase::PreCountdown(n) => println!("¿Listos? {}", n),
        Phase::Answering { index, .. } => {
            let opened = !matches!(
                previous_phase,
                Some(Phase::Answering { index: shown, .. }) if shown == index
            );
            if let (true, Some(question)) = (opened, &snapshot.question) {
                println!(
                    "Pregunta {}: {}",
                    snapshot.progress().unwrap_or_default(),
                    question.prompt
                );
                for (i, option) in question.options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
            }
            let urgent = if snapshot.is_urgent() { " !" } else { "" };
            println!(
                "  {}{}  respuestas {}/{}",
                snapshot.clock(),
                urgent,
                snapshot.answers_count,
                snapshot.roster_size
            );
        }
        Phase::Revealing { .. } => {
            let Some(question) = &snapshot.question else {
                return;
            };
            println!("Resultados ({} respuestas):", snapshot.answers_count);
            let correct = snapshot.correct_slots();
            let bars = snapshot.bars();
            for (i, option) in question.options.iter().enumerate() {
                let mark = if correct[i] { "✔" } else { " " };
                println!(
                    "  {} {:<24} {:>3}% ({})",
                    mark, option, bars[i], snapshot.tally[i]
                );
            }
            if previous_phase != Some(snapshot.phase) {
                println!("Escribe 'next' para continuar");
            }
        }
        Phase::Finished => println!("Fin de las preguntas"),
        Phase::Cancelled => {}
    }
}

fn print_podium(standings: &Standings) {
    println!("Podio:");
    let places = [standings.first(), standings.second(), standings.third()];
    for (i, player) in places.iter().enumerate() {
        if let Some(p) = player {
            println!("  {}. {} - {} pts", i + 1, p.name, p.score);
        }
    }
    for (i, p) in standings.rest().iter().enumerate() {
        println!("  {}. {} - {} pts", i + 4, p.name, p.score);
    }
}

async fn play(config: &ClientConfig, mut form: JoinForm) -> Result<()> {
    if !form.avatar.starts_with('/') && !form.avatar.starts_with("http") {
        form.avatar = avatar_url(&form.avatar);
    }

    let (link, relay) = RoomLink::connect(&config.relay_addr).await?;
    // Subscribe before joining so game_started is not missed
    let mut events = link.subscribe();

    if let JoinOutcome::Rejected(message) = join_room(&link, &form, JOIN_GRACE).await? {
        relay.shutdown();
        bail!("No se pudo unir: {}", message);
    }
    let request = form.to_request()?;
    println!("¡Estás dentro! Espera a que el profesor inicie.");

    let mut player = PlayerController::new(request.room_code, request.player_name, link.clone());
    let mut input = spawn_stdin_lines();

    while !player.is_over() {
        tokio::select! {
            event = events.recv() => {
                let Ok(event) = event else { continue };
                if player.on_server_event(&event) {
                    print_player_state(player.state());
                }
            }
            line = input.recv() => {
                let Some(line) = line else { break };
                let result = match line.as_str() {
                    "send" => player.submit_selection(),
                    n => match n.parse::<usize>() {
                        Ok(n) if n > 0 => player.choose(n - 1),
                        _ => {
                            println!("Escribe el número de la opción o 'send'");
                            continue;
                        }
                    },
                };
                match result {
                    Ok(()) => print_player_state(player.state()),
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    relay.shutdown();
    Ok(())
}

fn print_player_state(state: &PlayerState) {
    match state {
        PlayerState::Lobby => println!("En la sala de espera..."),
        PlayerState::Waiting => println!("¡Atento a la pantalla!"),
        PlayerState::Answering {
            options, selected, ..
        } => {
            for (i, option) in options.iter().enumerate() {
                let mark = if selected.contains(&i) { "*" } else { " " };
                println!(" {}{}. {}", mark, i + 1, option);
            }
        }
        PlayerState::Submitted => println!("Respuesta enviada..."),
        PlayerState::Feedback(result) if result.is_correct => {
            println!("¡Correcto! +{} (total {})", result.points_earned, result.total_score)
        }
        PlayerState::Feedback(result) => println!("Incorrecto (total {})", result.total_score),
        PlayerState::GameOver { rank: Some(rank) } => println!("Terminaste en el lugar #{}", rank),
        PlayerState::GameOver { rank: None } => println!("Juego terminado"),
        PlayerState::Cancelled => println!("El profesor ha terminado la partida."),
    }
}
