//! Операции с окнами X11 через xdotool, xprop, wmctrl и xrandr.
//!
//! Геометрия окна везде внешняя (с рамкой): клиентская область из xdotool
//! расширяется на `_NET_FRAME_EXTENTS`, а при установке рамка вычитается
//! обратно, иначе окно «уползает» на ширину декораций при каждом цикле.

use super::WindowOps;
use crate::ahk_error;
use crate::error::{AhkError, Result};
use crate::events::{Placement, Rect, WindowRef};
use crate::utils::command::{run_tool, tool_available};
use tracing::debug;

pub struct X11WindowOps {
    restricted_classes: Vec<String>,
}

/// Толщина рамки окна: left, right, top, bottom
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrameExtents {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

impl X11WindowOps {
    pub fn new(restricted_classes: Vec<String>) -> Self {
        Self {
            restricted_classes: restricted_classes
                .into_iter()
                .map(|class| class.to_lowercase())
                .collect(),
        }
    }

    /// Проверяет наличие обязательных утилит
    pub fn probe(&self) -> Result<()> {
        let missing: Vec<&str> = ["xdotool", "xprop", "wmctrl"]
            .into_iter()
            .filter(|tool| !tool_available(tool))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ahk_error!(service_unavailable, "не найдены утилиты: {}", missing.join(", ")))
        }
    }

    fn frame_extents(&self, window: WindowRef) -> FrameExtents {
        let id = window.id().to_string();
        match run_tool("xprop", &["-id", &id, "_NET_FRAME_EXTENTS"]) {
            Ok(output) => {
                let values = parse_cardinals(&output, "_NET_FRAME_EXTENTS");
                match values.as_slice() {
                    [left, right, top, bottom, ..] => FrameExtents {
                        left: *left as i32,
                        right: *right as i32,
                        top: *top as i32,
                        bottom: *bottom as i32,
                    },
                    _ => FrameExtents::default(),
                }
            }
            Err(e) => {
                debug!("Рамка окна {} неизвестна: {}", window, e);
                FrameExtents::default()
            }
        }
    }

    fn wmctrl_state(&self, window: WindowRef, change: &str) -> Result<()> {
        let id = format!("0x{:x}", window.id());
        run_tool("wmctrl", &["-i", "-r", &id, "-b", change]).map(|_| ())
    }

    fn root_work_area(&self) -> Result<Rect> {
        let output = run_tool("xprop", &["-root", "_NET_CURRENT_DESKTOP", "_NET_WORKAREA"])?;
        let desktop = parse_cardinals(&output, "_NET_CURRENT_DESKTOP")
            .first()
            .copied()
            .unwrap_or(0) as usize;
        parse_work_area(&output, desktop)
    }

    fn monitors(&self) -> Vec<Rect> {
        match run_tool("xrandr", &["--listactivemonitors"]) {
            Ok(output) => parse_monitors(&output),
            Err(e) => {
                debug!("xrandr недоступен, используем общую рабочую область: {}", e);
                Vec::new()
            }
        }
    }
}

impl WindowOps for X11WindowOps {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn active_window(&self) -> Result<Option<WindowRef>> {
        match run_tool("xdotool", &["getactivewindow"]) {
            Ok(output) => Ok(parse_window_id(&output)),
            // xdotool завершается с ошибкой, когда активного окна нет
            Err(AhkError::Tool { message, .. }) => {
                debug!("Активное окно не найдено: {}", message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn geometry(&self, window: WindowRef) -> Result<Rect> {
        let id = window.id().to_string();
        let output = run_tool("xdotool", &["getwindowgeometry", "--shell", &id])?;
        let client = parse_shell_geometry(&output)?;
        let frame = self.frame_extents(window);
        Ok(Rect::new(
            client.left - frame.left,
            client.top - frame.top,
            client.right + frame.right,
            client.bottom + frame.bottom,
        ))
    }

    fn set_geometry(&self, window: WindowRef, rect: Rect) -> Result<()> {
        let frame = self.frame_extents(window);
        let width = (rect.width() - frame.left - frame.right).max(1);
        let height = (rect.height() - frame.top - frame.bottom).max(1);
        let id = format!("0x{:x}", window.id());
        // gravity 0: координаты относятся к внешнему углу рамки
        let geometry = format!("0,{},{},{},{}", rect.left, rect.top, width, height);
        debug!("wmctrl -e {} для окна {}", geometry, window);
        run_tool("wmctrl", &["-i", "-r", &id, "-e", &geometry]).map(|_| ())
    }

    fn placement(&self, window: WindowRef) -> Result<Placement> {
        let id = window.id().to_string();
        let output = run_tool("xprop", &["-id", &id, "_NET_WM_STATE"])?;
        Ok(parse_placement(&output))
    }

    fn set_placement(&self, window: WindowRef, placement: Placement) -> Result<()> {
        match placement {
            Placement::Normal => self.wmctrl_state(window, "remove,maximized_vert,maximized_horz"),
            Placement::Maximized => self.wmctrl_state(window, "add,maximized_vert,maximized_horz"),
            Placement::Minimized => {
                let id = window.id().to_string();
                run_tool("xdotool", &["windowminimize", &id]).map(|_| ())
            }
        }
    }

    fn work_area(&self, window: WindowRef) -> Result<Rect> {
        let work_area = self.root_work_area()?;
        let (x, y) = self.geometry(window)?.center();

        let monitor = self
            .monitors()
            .into_iter()
            .find(|monitor| monitor.contains_point(x, y));

        Ok(match monitor {
            Some(monitor) => monitor.intersect(&work_area).unwrap_or(monitor),
            None => work_area,
        })
    }

    fn is_restricted(&self, window: WindowRef) -> Result<bool> {
        let id = window.id().to_string();
        let output = run_tool("xprop", &["-id", &id, "WM_CLASS", "_NET_WM_WINDOW_TYPE"])?;

        let restricted_type = parse_atoms(&output, "_NET_WM_WINDOW_TYPE").iter().any(|atom| {
            atom == "_NET_WM_WINDOW_TYPE_DESKTOP" || atom == "_NET_WM_WINDOW_TYPE_DOCK"
        });
        let restricted_class = parse_wm_class(&output)
            .iter()
            .any(|class| self.restricted_classes.contains(&class.to_lowercase()));

        Ok(restricted_type || restricted_class)
    }
}

fn parse_window_id(output: &str) -> Option<WindowRef> {
    output.trim().parse::<u64>().ok().filter(|id| *id != 0).map(WindowRef)
}

/// Вывод `xdotool getwindowgeometry --shell`: WINDOW=, X=, Y=, WIDTH=, HEIGHT=
fn parse_shell_geometry(output: &str) -> Result<Rect> {
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().parse::<i32>().ok();
        match key {
            "X" => x = value,
            "Y" => y = value,
            "WIDTH" => width = value,
            "HEIGHT" => height = value,
            _ => {}
        }
    }

    match (x, y, width, height) {
        (Some(x), Some(y), Some(width), Some(height)) => Ok(Rect::from_xywh(x, y, width, height)),
        _ => Err(ahk_error!(parse, "неполная геометрия окна: {:?}", output.trim())),
    }
}

/// Значение свойства xprop: часть строки после `=` для строки `NAME(TYPE) = ...`
fn property_value<'a>(output: &'a str, property: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let rest = line.strip_prefix(property)?;
        // Отсекаем свойства с общим префиксом имени
        if !(rest.starts_with('(') || rest.starts_with(':')) {
            return None;
        }
        rest.split_once('=').map(|(_, value)| value.trim())
    })
}

fn parse_cardinals(output: &str, property: &str) -> Vec<i64> {
    property_value(output, property)
        .map(|value| {
            value
                .split(',')
                .filter_map(|item| item.trim().parse::<i64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_atoms(output: &str, property: &str) -> Vec<String> {
    property_value(output, property)
        .map(|value| {
            value
                .split(',')
                .map(|atom| atom.trim().to_string())
                .filter(|atom| !atom.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `WM_CLASS(STRING) = "instance", "Class"`
fn parse_wm_class(output: &str) -> Vec<String> {
    property_value(output, "WM_CLASS")
        .map(|value| {
            value
                .split(',')
                .map(|part| part.trim().trim_matches('"').to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_placement(output: &str) -> Placement {
    let atoms = parse_atoms(output, "_NET_WM_STATE");
    let has = |name: &str| atoms.iter().any(|atom| atom == name);

    if has("_NET_WM_STATE_HIDDEN") {
        Placement::Minimized
    } else if has("_NET_WM_STATE_MAXIMIZED_VERT") && has("_NET_WM_STATE_MAXIMIZED_HORZ") {
        Placement::Maximized
    } else {
        Placement::Normal
    }
}

/// `_NET_WORKAREA` содержит по четыре числа (x, y, w, h) на каждый рабочий стол
fn parse_work_area(output: &str, desktop: usize) -> Result<Rect> {
    let values = parse_cardinals(output, "_NET_WORKAREA");
    let chunk = values
        .chunks_exact(4)
        .nth(desktop)
        .or_else(|| values.chunks_exact(4).next())
        .ok_or_else(|| ahk_error!(parse, "_NET_WORKAREA не найден"))?;

    Ok(Rect::from_xywh(
        chunk[0] as i32,
        chunk[1] as i32,
        chunk[2] as i32,
        chunk[3] as i32,
    ))
}

/// Строки `xrandr --listactivemonitors` вида ` 0: +*DP-1 1920/527x1080/296+0+0  DP-1`
fn parse_monitors(output: &str) -> Vec<Rect> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(2))
        .filter_map(parse_monitor_geometry)
        .collect()
}

fn parse_monitor_geometry(geometry: &str) -> Option<Rect> {
    let (width_part, rest) = geometry.split_once('x')?;
    let width = width_part.split('/').next()?.parse::<i32>().ok()?;

    let mut parts = rest.split('+');
    let height = parts.next()?.split('/').next()?.parse::<i32>().ok()?;
    let x = parts.next()?.parse::<i32>().ok()?;
    let y = parts.next()?.parse::<i32>().ok()?;

    Some(Rect::from_xywh(x, y, width, height))
}
