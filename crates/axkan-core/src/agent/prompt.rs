//! System prompt builder for the sales assistant.
//!
//! The prompt is an ordered list of fragments. Static fragments are business
//! copy; the catalog fragment is rendered from the live catalog on every turn.
//! Changing copy means editing the fragment table, not the builder.

use axkan_types::catalog::CatalogItem;

use super::parser::{IMAGE_CLOSE, IMAGE_OPEN, ORDER_CLOSE, ORDER_OPEN};

/// One section of the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptFragment {
    /// Fixed text.
    Static(String),
    /// The product catalog, rendered from live data.
    Catalog,
}

const PERSONA: &str = "Eres el asistente de ventas de AXKAN por WhatsApp. AXKAN es una marca de \
souvenirs con alma mexicana, especializados en recuerdos personalizados de MDF cortados con láser.";

const BRAND_VOICE: &str = "VOZ DE MARCA:
- Habla en español mexicano informal, usa \"tú\" (nunca \"usted\")
- Mensajes cortos: 1-3 oraciones máximo por respuesta
- Tono cálido, amigable, entusiasta pero profesional
- Usa signos de exclamación con moderación (1-2 por mensaje máximo)
- NO uses emojis excesivos, máximo 1-2 por mensaje

REGLAS IMPORTANTES:
1. NUNCA inventes productos o precios que no estén en el catálogo
2. Si el cliente pregunta por algo que no vendemos, dile amablemente que nos especializamos en souvenirs personalizados y muestra lo que tenemos
3. Si el cliente pregunta algo no relacionado con souvenirs, redirige amablemente la conversación
4. En el primer mensaje del cliente, siempre saluda cálidamente";

const SALES_PROCESS: &str = "PROCESO DE VENTA - Recopila esta información de forma natural en la conversación:
1. Nombre completo del cliente
2. Qué producto(s) quiere
3. Cantidad por producto
4. Tipo de evento (boda, XV años, bautizo, corporativo, etc.), opcional pero pregunta
5. Fecha de entrega deseada
6. Dirección de envío completa: calle y número, ciudad, estado, código postal

NO pidas toda la información de golpe. Ve recopilando de forma natural conforme avanza la plática.";

const STATUS_CONTRACT: &str = "CONSULTAS DE ESTADO DE PEDIDO:
- Si el cliente pregunta por el estado de un pedido, responde: \"Déjame revisar tu pedido, un momento por favor.\"
- No inventes estados, el sistema verificará automáticamente";

const EXAMPLES: &str = "EJEMPLOS DE RESPUESTAS:
- Saludo: \"Hola! Bienvenido a AXKAN, souvenirs con alma mexicana. En qué te puedo ayudar?\"
- Info productos: \"Tenemos imanes de MDF, llaveros, destapadores y más. Todos personalizados con el diseño que quieras. Qué te interesa?\"
- Recopilar info: \"Excelente elección! Para cuántas personas es el evento?\"
- Confirmar pedido: \"Perfecto, tu pedido queda así: 200 imanes personalizados por $2,000 MXN. Todo correcto?\"";

fn order_contract() -> String {
    format!(
        "CUANDO TENGAS TODA LA INFORMACIÓN necesaria (nombre, producto, cantidad, dirección completa con ciudad/estado/CP), haz lo siguiente:
1. Presenta un resumen del pedido al cliente con el total calculado
2. Pregunta si todo está correcto
3. Si el cliente confirma, genera el bloque de orden así:

{ORDER_OPEN}{{\"clientName\":\"Nombre Completo\",\"clientPhone\":\"PHONE_PLACEHOLDER\",\"items\":[{{\"productName\":\"Nombre del Producto\",\"quantity\":100,\"unitPrice\":10.00}}],\"eventType\":\"Tipo de Evento\",\"deliveryDate\":\"YYYY-MM-DD\",\"clientAddress\":\"Calle y número\",\"clientCity\":\"Ciudad\",\"clientState\":\"Estado\",\"notes\":\"Notas relevantes del pedido\"}}{ORDER_CLOSE}

IMPORTANTE sobre el bloque de orden:
- Solo genéralo cuando el cliente CONFIRME el pedido (diga \"sí\", \"correcto\", \"va\", \"dale\", etc.)
- clientPhone se llenará automáticamente, usa \"PHONE_PLACEHOLDER\" como valor
- unitPrice debe coincidir exactamente con el precio del catálogo
- deliveryDate en formato YYYY-MM-DD; si el cliente da fecha vaga, estima razonablemente
- El bloque debe estar en una sola línea, sin saltos de línea dentro del JSON
- Después del bloque, escribe un mensaje de confirmación para el cliente"
    )
}

fn media_contract() -> String {
    format!(
        "IMÁGENES DE PRODUCTOS:
- Si el cliente quiere ver un producto marcado con [imagen disponible], agrega {IMAGE_OPEN}Nombre exacto del producto{IMAGE_CLOSE} en tu respuesta y el sistema enviará la foto
- Puedes incluir varios bloques si el cliente pide ver varios productos
- Nunca prometas fotos de productos sin [imagen disponible]
- Si el cliente te manda una foto o un diseño, coméntalo con entusiasmo y úsalo como referencia del pedido
- Si recibes \"[Nota de voz sin transcripción]\", pide amablemente que te escriban el mensaje"
    )
}

/// The default fragment order: persona, brand voice, catalog, sales process,
/// order contract, status contract, media contract, examples.
pub fn default_fragments() -> Vec<PromptFragment> {
    vec![
        PromptFragment::Static(PERSONA.to_string()),
        PromptFragment::Static(BRAND_VOICE.to_string()),
        PromptFragment::Catalog,
        PromptFragment::Static(SALES_PROCESS.to_string()),
        PromptFragment::Static(order_contract()),
        PromptFragment::Static(STATUS_CONTRACT.to_string()),
        PromptFragment::Static(media_contract()),
        PromptFragment::Static(EXAMPLES.to_string()),
    ]
}

/// Assembles the system prompt from an ordered fragment list.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    fragments: Vec<PromptFragment>,
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self::new(default_fragments())
    }
}

impl SystemPromptBuilder {
    pub fn new(fragments: Vec<PromptFragment>) -> Self {
        Self { fragments }
    }

    pub fn build(&self, catalog: &[CatalogItem]) -> String {
        self.fragments
            .iter()
            .map(|fragment| match fragment {
                PromptFragment::Static(text) => text.trim().to_string(),
                PromptFragment::Catalog => render_catalog(catalog),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Render the catalog section, one product per line.
pub fn render_catalog(catalog: &[CatalogItem]) -> String {
    let mut out = String::from("CATÁLOGO DE PRODUCTOS (precios por pieza):");
    if catalog.is_empty() {
        out.push_str("\n(catálogo no disponible por el momento)");
        return out;
    }
    for item in catalog {
        out.push_str(&format!("\n- {}: ${:.2} MXN", item.name, item.price));
        if let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(", {desc}"));
        }
        if let Some(cat) = item.category.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!(" ({cat})"));
        }
        if item.has_image() {
            out.push_str(" [imagen disponible]");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem {
                name: "Imanes".into(),
                price: 11.0,
                description: Some("Imán de MDF 5x5 cm".into()),
                category: Some("Recuerdos".into()),
                cost: 2.5,
                image_url: Some("https://cdn/imanes.jpg".into()),
            },
            CatalogItem {
                name: "Llaveros".into(),
                price: 9.5,
                description: None,
                category: None,
                cost: 2.0,
                image_url: None,
            },
        ]
    }

    #[test]
    fn test_render_catalog_lines() {
        let rendered = render_catalog(&catalog());
        assert!(rendered.contains(
            "- Imanes: $11.00 MXN, Imán de MDF 5x5 cm (Recuerdos) [imagen disponible]"
        ));
        assert!(rendered.contains("- Llaveros: $9.50 MXN\n") || rendered.ends_with("- Llaveros: $9.50 MXN"));
    }

    #[test]
    fn test_fragments_keep_order() {
        let prompt = SystemPromptBuilder::default().build(&catalog());
        let persona = prompt.find("Eres el asistente").unwrap();
        let voice = prompt.find("VOZ DE MARCA").unwrap();
        let catalog = prompt.find("CATÁLOGO DE PRODUCTOS").unwrap();
        let sales = prompt.find("PROCESO DE VENTA").unwrap();
        let order = prompt.find(ORDER_OPEN).unwrap();
        let status = prompt.find("CONSULTAS DE ESTADO").unwrap();
        let media = prompt.find("IMÁGENES DE PRODUCTOS").unwrap();
        let examples = prompt.find("EJEMPLOS DE RESPUESTAS").unwrap();
        assert!(persona < voice && voice < catalog && catalog < sales);
        assert!(sales < order && order < status && status < media && media < examples);
    }

    #[test]
    fn test_custom_fragments() {
        let builder = SystemPromptBuilder::new(vec![
            PromptFragment::Static("Hola".into()),
            PromptFragment::Catalog,
        ]);
        let prompt = builder.build(&[]);
        assert!(prompt.starts_with("Hola\n\nCATÁLOGO"));
        assert!(prompt.contains("no disponible"));
    }
}
