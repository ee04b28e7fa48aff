use crate::infra::{parse_document_arg, DocumentArg};
use crate::server;
use clap::{Args, Parser, Subcommand};
use registration::error::AppError;
use registration::{FileAttachment, RegistrationClient, RegistrationDetails, RegistrationForm};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Registration Service",
    about = "Run the user registration service or submit a registration from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Submit a registration to a running service
    Register(RegisterArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    /// Base URL of the registration service
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub(crate) server: String,
    /// JSON file with the applicant details (camelCase fields)
    #[arg(long)]
    pub(crate) details: PathBuf,
    /// Document to upload as LABEL:TYPE:PATH, where TYPE is image or pdf (repeatable)
    #[arg(long = "document", value_parser = parse_document_arg)]
    pub(crate) documents: Vec<DocumentArg>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Register(args) => register(args).await,
    }
}

async fn register(args: RegisterArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.details).await?;
    let details: RegistrationDetails = serde_json::from_str(&raw).map_err(|err| {
        AppError::InvalidInput(format!("{}: {err}", args.details.display()))
    })?;

    let mut form = RegistrationForm::new();
    fill_form(&mut form, details);
    for document in &args.documents {
        let bytes = tokio::fs::read(&document.path).await?;
        let name = document
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.label.clone());
        let index = form.add_document();
        if let Some(row) = form.document_mut(index) {
            row.file_name = document.label.clone();
            row.file_type = document.file_type;
        }
        form.attach(index, FileAttachment::guessed(name, bytes));
    }

    let client = RegistrationClient::new(&args.server);
    let notice = client.submit(&mut form).await?;
    if notice.is_success() {
        println!("{}", notice.message);
        Ok(())
    } else {
        Err(AppError::Rejected(notice.message))
    }
}

fn fill_form(form: &mut RegistrationForm, details: RegistrationDetails) {
    form.first_name = details.first_name;
    form.last_name = details.last_name;
    form.email = details.email;
    form.dob = details.dob;
    form.set_residential_street1(details.residential.street1);
    form.set_residential_street2(details.residential.street2);
    form.set_permanent_street1(details.permanent.street1);
    form.set_permanent_street2(details.permanent.street2);
    form.set_same_as_residential(details.same_as_residential);
    while form.remove_document(0).is_some() {}
}
