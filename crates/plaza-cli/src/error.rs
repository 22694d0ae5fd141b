use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Unknown command: {cmd}; type `help` for the list")]
    UnknownCommand { cmd: String },

    #[error("`{cmd}` needs {arg}")]
    MissingArgument { cmd: &'static str, arg: &'static str },

    /// The post was not found on any page of the feed.
    #[error("No post with ID {id} in the feed")]
    PostNotFound { id: String },

    #[error("Nothing to change; pass --content and/or --media")]
    EmptyEdit,
}
