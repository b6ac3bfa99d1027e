//! Filesystem Tools
//!
//! List, read, write, create and edit paths relative to the process working
//! directory. Every one of them goes through the confirmation gate, read-only
//! ones included.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use agent_core::{ParamType, ParameterSchema, Result as CoreResult, Tool, ToolArguments, ToolSchema};

use crate::error::{Result, ToolError};

fn path_param(description: &str) -> ParameterSchema {
    ParameterSchema::required("path", ParamType::String, description).non_empty()
}

// ============================================================================
// list_directory
// ============================================================================

#[derive(Debug, Serialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "isDirectory")]
    is_directory: bool,
}

async fn list_directory(path: &str) -> Result<String> {
    let mut reader = tokio::fs::read_dir(path)
        .await
        .map_err(ToolError::io("listing directory", path))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(ToolError::io("listing directory", path))?
    {
        let is_directory = entry
            .file_type()
            .await
            .map_err(ToolError::io("listing directory", path))?
            .is_dir();
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_directory,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(serde_json::to_string(&entries)?)
}

/// Lists files and subdirectories of a directory
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "list_directory".into(),
            description: "List the contents (files and subdirectories) of the given directory.".into(),
            parameters: vec![path_param("Path of the directory to list")],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        format!("List the contents of this directory? {}", args.opt_str("path").unwrap_or_default())
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        Ok(list_directory(args.str("path")?).await?)
    }
}

// ============================================================================
// read_file
// ============================================================================

/// Reads a UTF-8 file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read the contents of the given file.".into(),
            parameters: vec![path_param("Path of the file to read")],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        format!("Read this file? {}", args.opt_str("path").unwrap_or_default())
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        let path = args.str("path")?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(ToolError::io("reading file", path))?;
        Ok(content)
    }
}

// ============================================================================
// write_file
// ============================================================================

async fn write_file(path: &str, content: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ToolError::io("writing file", path))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(ToolError::io("writing file", path))
}

/// Creates or overwrites a file, creating parent directories
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".into(),
            description: "Create or overwrite a file at the given path. Missing parent directories are created.".into(),
            parameters: vec![
                path_param("Path of the file to write"),
                ParameterSchema::required("content", ParamType::String, "Content to write to the file"),
            ],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        format!(
            "Allow writing this file? {}\ncontent: {}",
            args.opt_str("path").unwrap_or_default(),
            args.opt_str("content").unwrap_or_default()
        )
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        let path = args.str("path")?;
        write_file(path, args.str("content")?).await?;
        Ok(format!("File written successfully to {path}"))
    }
}

// ============================================================================
// create_directory
// ============================================================================

async fn create_directory(path: &str) -> Result<String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(format!("Directory already exists at {path}")),
        Ok(_) => return Err(ToolError::NotADirectory(path.to_string())),
        Err(_) => {}
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(ToolError::io("creating directory", path))?;
    Ok(format!("Directory created successfully at {path}"))
}

/// Creates a directory and any missing parents
pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_directory".into(),
            description: "Create a new directory at the given path, including missing parent directories.".into(),
            parameters: vec![path_param("Path of the directory to create")],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        format!("Create this directory? {}", args.opt_str("path").unwrap_or_default())
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        Ok(create_directory(args.str("path")?).await?)
    }
}

// ============================================================================
// edit_file
// ============================================================================

async fn edit_file(path: &str, search_text: &str, replace_with: &str) -> Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(ToolError::io("editing file", path))?;

    if !content.contains(search_text) {
        return Ok(format!(
            "Warning: search_text \"{search_text}\" not found in {path}. File not modified."
        ));
    }

    let edited = content.replacen(search_text, replace_with, 1);
    tokio::fs::write(path, edited)
        .await
        .map_err(ToolError::io("editing file", path))?;
    Ok(format!("File {path} edited successfully."))
}

/// Replaces the first literal occurrence of a string in a file
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "edit_file".into(),
            description: "Find text in the given file and replace its first occurrence with new text. To delete text, pass an empty replace_with.".into(),
            parameters: vec![
                path_param("Path of the file to edit"),
                ParameterSchema::required("search_text", ParamType::String, "Literal text to search for"),
                ParameterSchema::required("replace_with", ParamType::String, "Text that replaces search_text"),
            ],
        }
    }

    fn describe(&self, args: &ToolArguments) -> String {
        format!(
            "Allow editing this file? {}\nsearch_text: {}\nreplace_with: {}",
            args.opt_str("path").unwrap_or_default(),
            args.opt_str("search_text").unwrap_or_default(),
            args.opt_str("replace_with").unwrap_or_default()
        )
    }

    async fn execute(&self, args: &ToolArguments) -> CoreResult<String> {
        Ok(edit_file(args.str("path")?, args.str("search_text")?, args.str("replace_with")?).await?)
    }
}
