use clap::Parser;

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    linkerd-install completions --shell bash > ~/.bash_completion.d/linkerd-install\n\n\
                  Generate zsh completions:\n    linkerd-install completions --shell zsh > ~/.zfunc/_linkerd-install\n\n\
                  Generate fish completions:\n    linkerd-install completions --shell fish > ~/.config/fish/completions/linkerd-install.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long, short = 's', value_name = "SHELL")]
    pub shell: String,
}
